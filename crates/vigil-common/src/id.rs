use snowflake::SnowflakeIdGenerator;
use std::sync::Mutex;

/// 固定宽度：i64 最大值的十进制位数
const ID_WIDTH: usize = 19;

/// Snowflake ID 生成器
///
/// 生成的 ID 为补零到 19 位的十进制字符串，严格递增，字典序与生成顺序一致，
/// 因此可以直接作为分页游标（`id > offset`）使用。
pub struct IdGenerator {
    inner: Mutex<SnowflakeIdGenerator>,
}

impl IdGenerator {
    /// `machine_id`: 机器标识 (0-31)
    /// `node_id`: 节点标识 (0-31)
    pub fn new(machine_id: i32, node_id: i32) -> Self {
        Self {
            inner: Mutex::new(SnowflakeIdGenerator::new(machine_id, node_id)),
        }
    }

    /// 生成一个 Snowflake ID（字符串形式）
    pub fn next_id(&self) -> String {
        let mut generator = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        format!("{:0width$}", generator.real_time_generate(), width = ID_WIDTH)
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new(1, 1)
    }
}
