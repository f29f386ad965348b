use crate::store::SqlStore;
use crate::{
    AlarmDefinitionFilter, AlarmDefinitionPatch, AlarmDefinitionRepo, AlarmDefinitionWrite,
    NotificationMethodRepo, StorageError,
};
use vigil_common::id::IdGenerator;
use vigil_common::types::{NotificationMethodType, Severity};
use tempfile::TempDir;

async fn setup() -> (TempDir, SqlStore) {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}/vigil.db?mode=rwc", dir.path().display());
    let store = SqlStore::new(&url, dir.path(), IdGenerator::default())
        .await
        .unwrap();
    (dir, store)
}

fn definition(name: &str, expression: &str) -> AlarmDefinitionWrite {
    AlarmDefinitionWrite {
        name: name.to_string(),
        expression: expression.to_string(),
        actions_enabled: true,
        ..Default::default()
    }
}

async fn email(store: &SqlStore, tenant: &str, name: &str) -> String {
    NotificationMethodRepo::create(
        store,
        tenant,
        name,
        NotificationMethodType::Email,
        "ops@example.com",
    )
    .await
    .unwrap()
}

// ---- notification methods ----

#[tokio::test]
async fn notification_method_crud() {
    let (_dir, store) = setup().await;
    let id = email(&store, "t1", "ops").await;

    let row = NotificationMethodRepo::get(&store, "t1", &id).await.unwrap();
    assert_eq!(row.name, "ops");
    assert_eq!(row.method_type, NotificationMethodType::Email);

    let updated = NotificationMethodRepo::update(
        &store,
        &id,
        "t1",
        "ops-hook",
        NotificationMethodType::Webhook,
        "https://hooks.example.com/x",
    )
    .await
    .unwrap();
    assert_eq!(updated.name, "ops-hook");
    assert_eq!(updated.created_at, row.created_at);

    NotificationMethodRepo::delete(&store, "t1", &id).await.unwrap();
    let err = NotificationMethodRepo::get(&store, "t1", &id).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound { .. }));
}

#[tokio::test]
async fn notification_method_name_unique_per_tenant() {
    let (_dir, store) = setup().await;
    email(&store, "t1", "ops").await;

    let err = NotificationMethodRepo::create(
        &store,
        "t1",
        "ops",
        NotificationMethodType::Email,
        "other@example.com",
    )
    .await
    .unwrap_err();
    assert!(matches!(err, StorageError::AlreadyExists { .. }));

    // same name in another tenant is fine
    email(&store, "t2", "ops").await;
}

#[tokio::test]
async fn notification_method_is_tenant_scoped() {
    let (_dir, store) = setup().await;
    let id = email(&store, "t1", "ops").await;

    assert!(matches!(
        NotificationMethodRepo::get(&store, "t2", &id).await,
        Err(StorageError::NotFound { .. })
    ));
    assert!(matches!(
        NotificationMethodRepo::delete(&store, "t2", &id).await,
        Err(StorageError::NotFound { .. })
    ));
    assert!(NotificationMethodRepo::get(&store, "t1", &id).await.is_ok());
}

#[tokio::test]
async fn find_by_name_and_find_missing() {
    let (_dir, store) = setup().await;
    let id = email(&store, "t1", "ops").await;

    let found = store.find_by_name("t1", "ops").await.unwrap();
    assert_eq!(found.map(|r| r.id), Some(id.clone()));
    assert!(store.find_by_name("t1", "nope").await.unwrap().is_none());

    let missing = store
        .find_missing("t1", &[id.clone(), "404".to_string(), "404".to_string()])
        .await
        .unwrap();
    assert_eq!(missing, vec!["404".to_string()]);

    let other_tenant = store.find_missing("t2", &[id.clone()]).await.unwrap();
    assert_eq!(other_tenant, vec![id]);
}

#[tokio::test]
async fn notification_method_list_pages_by_id() {
    let (_dir, store) = setup().await;
    for i in 0..5 {
        email(&store, "t1", &format!("m{i}")).await;
    }

    let first = NotificationMethodRepo::list(&store, "t1", None, 2).await.unwrap();
    assert_eq!(first.len(), 3, "limit + 1 probe row");
    let cursor = first[1].id.clone();
    let rest = NotificationMethodRepo::list(&store, "t1", Some(&cursor), 10)
        .await
        .unwrap();
    assert_eq!(rest.len(), 3);
    assert!(rest.iter().all(|r| r.id > cursor));
}

#[tokio::test]
async fn deleting_method_unlinks_actions() {
    let (_dir, store) = setup().await;
    let keep = email(&store, "t1", "keep").await;
    let gone = email(&store, "t1", "gone").await;

    let mut def = definition("cpu", "max(cpu.system_perc) > 0");
    def.alarm_actions = vec![gone.clone(), keep.clone()];
    let created = AlarmDefinitionRepo::create(&store, "t1", &def).await.unwrap();

    NotificationMethodRepo::delete(&store, "t1", &gone).await.unwrap();
    let row = AlarmDefinitionRepo::get(&store, "t1", &created.id).await.unwrap();
    assert_eq!(row.alarm_actions, vec![keep]);
}

// ---- alarm definitions ----

#[tokio::test]
async fn alarm_definition_round_trip() {
    let (_dir, store) = setup().await;
    let m1 = email(&store, "t1", "a").await;
    let m2 = email(&store, "t1", "b").await;

    let def = AlarmDefinitionWrite {
        name: "cpu-high".into(),
        description: "cpu too busy".into(),
        expression: "max(cpu.system_perc{hostname=web01}) > 90".into(),
        match_by: vec!["hostname".into()],
        severity: Severity::High,
        actions_enabled: false,
        alarm_actions: vec![m2.clone(), m1.clone()],
        ok_actions: vec![m1.clone()],
        undetermined_actions: vec![],
    };
    let created = AlarmDefinitionRepo::create(&store, "t1", &def).await.unwrap();
    let fetched = AlarmDefinitionRepo::get(&store, "t1", &created.id).await.unwrap();

    assert_eq!(fetched, created);
    assert_eq!(fetched.name, def.name);
    assert_eq!(fetched.match_by, def.match_by);
    assert_eq!(fetched.severity, Severity::High);
    assert!(!fetched.actions_enabled);
    assert_eq!(fetched.alarm_actions, vec![m2, m1.clone()]);
    assert_eq!(fetched.ok_actions, vec![m1]);
    assert!(fetched.undetermined_actions.is_empty());
}

#[tokio::test]
async fn duplicate_name_rejected_and_first_untouched() {
    let (_dir, store) = setup().await;
    let first = AlarmDefinitionRepo::create(&store, "t1", &definition("dup", "avg(mem) > 1"))
        .await
        .unwrap();

    let err = AlarmDefinitionRepo::create(&store, "t1", &definition("dup", "avg(disk) > 2"))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::AlreadyExists { .. }));

    let still = AlarmDefinitionRepo::get(&store, "t1", &first.id).await.unwrap();
    assert_eq!(still.expression, "avg(mem) > 1");
}

#[tokio::test]
async fn unknown_action_reference_persists_nothing() {
    let (_dir, store) = setup().await;
    let known = email(&store, "t1", "ops").await;

    let mut def = definition("cpu", "max(cpu.system_perc) > 0");
    def.alarm_actions = vec![known];
    def.ok_actions = vec!["does-not-exist".into()];
    let err = AlarmDefinitionRepo::create(&store, "t1", &def).await.unwrap_err();
    match err {
        StorageError::InvalidActionReference { id } => assert_eq!(id, "does-not-exist"),
        other => panic!("unexpected error: {other}"),
    }

    let rows = AlarmDefinitionRepo::list(&store, "t1", &AlarmDefinitionFilter::default(), None, 10)
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn method_of_another_tenant_is_not_a_valid_action() {
    let (_dir, store) = setup().await;
    let foreign = email(&store, "t2", "ops").await;

    let mut def = definition("cpu", "max(cpu.system_perc) > 0");
    def.alarm_actions = vec![foreign];
    let err = AlarmDefinitionRepo::create(&store, "t1", &def).await.unwrap_err();
    assert!(matches!(err, StorageError::InvalidActionReference { .. }));
}

#[tokio::test]
async fn update_replaces_actions_and_keeps_created_at() {
    let (_dir, store) = setup().await;
    let a = email(&store, "t1", "a").await;
    let b = email(&store, "t1", "b").await;

    let mut def = definition("cpu", "max(cpu.system_perc) > 0");
    def.alarm_actions = vec![a.clone()];
    def.ok_actions = vec![a.clone()];
    let created = AlarmDefinitionRepo::create(&store, "t1", &def).await.unwrap();

    let mut next = definition("cpu-renamed", "max(cpu.user_perc) > 50");
    next.alarm_actions = vec![b.clone()];
    let updated = AlarmDefinitionRepo::update(&store, "t1", &created.id, &next)
        .await
        .unwrap();
    assert_eq!(updated.name, "cpu-renamed");
    assert_eq!(updated.alarm_actions, vec![b]);
    assert!(updated.ok_actions.is_empty());
    assert_eq!(updated.created_at, created.created_at);

    let fetched = AlarmDefinitionRepo::get(&store, "t1", &created.id).await.unwrap();
    assert_eq!(fetched, updated);
}

#[tokio::test]
async fn update_with_bad_reference_leaves_row_intact() {
    let (_dir, store) = setup().await;
    let a = email(&store, "t1", "a").await;
    let mut def = definition("cpu", "max(cpu.system_perc) > 0");
    def.alarm_actions = vec![a.clone()];
    let created = AlarmDefinitionRepo::create(&store, "t1", &def).await.unwrap();

    let mut next = definition("renamed", "max(cpu.system_perc) > 10");
    next.alarm_actions = vec!["missing".into()];
    let err = AlarmDefinitionRepo::update(&store, "t1", &created.id, &next)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::InvalidActionReference { .. }));

    let fetched = AlarmDefinitionRepo::get(&store, "t1", &created.id).await.unwrap();
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn patch_with_bad_reference_leaves_row_intact() {
    let (_dir, store) = setup().await;
    let a = email(&store, "t1", "a").await;
    let mut def = definition("cpu", "max(cpu.system_perc{hostname=h1}) > 0");
    def.alarm_actions = vec![a.clone()];
    def.ok_actions = vec![a.clone()];
    let created = AlarmDefinitionRepo::create(&store, "t1", &def).await.unwrap();

    let patch = AlarmDefinitionPatch {
        name: Some("renamed".into()),
        expression: Some("max(cpu.system_perc{hostname=h2}) > 10".into()),
        alarm_actions: Some(vec![a.clone(), "missing".into()]),
        ..Default::default()
    };
    let err = store.patch("t1", &created.id, &patch).await.unwrap_err();
    assert!(matches!(err, StorageError::InvalidActionReference { ref id } if id == "missing"));

    let fetched = AlarmDefinitionRepo::get(&store, "t1", &created.id).await.unwrap();
    assert_eq!(fetched, created);

    // dimension rows were not replaced either
    let filter = AlarmDefinitionFilter {
        dimensions: vec![("hostname".into(), "h1".into())],
        ..Default::default()
    };
    let rows = AlarmDefinitionRepo::list(&store, "t1", &filter, None, 10)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn patch_unknown_definition_is_not_found() {
    let (_dir, store) = setup().await;
    let created = AlarmDefinitionRepo::create(&store, "t1", &definition("cpu", "avg(cpu) > 1"))
        .await
        .unwrap();
    let patch = AlarmDefinitionPatch {
        severity: Some(Severity::High),
        ..Default::default()
    };

    let err = store.patch("t1", "does-not-exist", &patch).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound { .. }));

    // another tenant's id is just as unknown
    let err = store.patch("t2", &created.id, &patch).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound { .. }));

    let fetched = AlarmDefinitionRepo::get(&store, "t1", &created.id).await.unwrap();
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn rename_to_existing_name_conflicts() {
    let (_dir, store) = setup().await;
    AlarmDefinitionRepo::create(&store, "t1", &definition("one", "avg(a) > 1"))
        .await
        .unwrap();
    let two = AlarmDefinitionRepo::create(&store, "t1", &definition("two", "avg(b) > 1"))
        .await
        .unwrap();

    let patch = AlarmDefinitionPatch {
        name: Some("one".into()),
        ..Default::default()
    };
    let err = store.patch("t1", &two.id, &patch).await.unwrap_err();
    assert!(matches!(err, StorageError::AlreadyExists { .. }));

    // renaming to its own name is not a conflict
    let same = AlarmDefinitionPatch {
        name: Some("two".into()),
        ..Default::default()
    };
    assert!(store.patch("t1", &two.id, &same).await.is_ok());
}

#[tokio::test]
async fn patch_merges_only_supplied_fields() {
    let (_dir, store) = setup().await;
    let a = email(&store, "t1", "a").await;
    let mut def = definition("cpu", "max(cpu.system_perc) > 0");
    def.description = "keep me".into();
    def.match_by = vec!["hostname".into()];
    def.alarm_actions = vec![a.clone()];
    let created = AlarmDefinitionRepo::create(&store, "t1", &def).await.unwrap();

    let patch = AlarmDefinitionPatch {
        severity: Some(Severity::Critical),
        actions_enabled: Some(false),
        ..Default::default()
    };
    let patched = store.patch("t1", &created.id, &patch).await.unwrap();
    assert_eq!(patched.severity, Severity::Critical);
    assert!(!patched.actions_enabled);
    assert_eq!(patched.description, "keep me");
    assert_eq!(patched.match_by, vec!["hostname".to_string()]);
    assert_eq!(patched.alarm_actions, vec![a]);
    assert_eq!(patched.expression, created.expression);
}

#[tokio::test]
async fn delete_cascades_and_get_is_not_found() {
    let (_dir, store) = setup().await;
    let a = email(&store, "t1", "a").await;
    let mut def = definition("cpu", "max(cpu.system_perc{hostname=h1}) > 0");
    def.alarm_actions = vec![a.clone()];
    let created = AlarmDefinitionRepo::create(&store, "t1", &def).await.unwrap();

    AlarmDefinitionRepo::delete(&store, "t1", &created.id).await.unwrap();
    assert!(matches!(
        AlarmDefinitionRepo::get(&store, "t1", &created.id).await,
        Err(StorageError::NotFound { .. })
    ));
    assert!(matches!(
        AlarmDefinitionRepo::delete(&store, "t1", &created.id).await,
        Err(StorageError::NotFound { .. })
    ));

    use crate::entities::{alarm_action, alarm_definition_dimension};
    use sea_orm::{EntityTrait, PaginatorTrait};
    assert_eq!(alarm_action::Entity::find().count(store.db()).await.unwrap(), 0);
    assert_eq!(
        alarm_definition_dimension::Entity::find()
            .count(store.db())
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn list_filters_by_name_and_dimensions() {
    let (_dir, store) = setup().await;
    let web = AlarmDefinitionRepo::create(
        &store,
        "t1",
        &definition("web", "avg(cpu{hostname=web01,service=nginx}) > 80"),
    )
    .await
    .unwrap();
    let db = AlarmDefinitionRepo::create(
        &store,
        "t1",
        &definition("db", "avg(cpu{hostname=db01}) > 80 or avg(mem{service=nginx}) > 1"),
    )
    .await
    .unwrap();

    let by_name = AlarmDefinitionFilter {
        name: Some("db".into()),
        ..Default::default()
    };
    let rows = AlarmDefinitionRepo::list(&store, "t1", &by_name, None, 10).await.unwrap();
    assert_eq!(rows.iter().map(|r| &r.id).collect::<Vec<_>>(), vec![&db.id]);

    let nginx = AlarmDefinitionFilter {
        dimensions: vec![("service".into(), "nginx".into())],
        ..Default::default()
    };
    let rows = AlarmDefinitionRepo::list(&store, "t1", &nginx, None, 10).await.unwrap();
    assert_eq!(rows.len(), 2);

    let web_nginx = AlarmDefinitionFilter {
        dimensions: vec![
            ("service".into(), "nginx".into()),
            ("hostname".into(), "web01".into()),
        ],
        ..Default::default()
    };
    let rows = AlarmDefinitionRepo::list(&store, "t1", &web_nginx, None, 10).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, web.id);

    let none = AlarmDefinitionRepo::list(&store, "t2", &nginx, None, 10).await.unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn list_pagination_has_no_gaps_or_duplicates() {
    let (_dir, store) = setup().await;
    let mut expected = Vec::new();
    for i in 0..7 {
        let row = AlarmDefinitionRepo::create(&store, "t1", &definition(&format!("d{i}"), "avg(x) > 1"))
            .await
            .unwrap();
        expected.push(row.id);
    }

    let filter = AlarmDefinitionFilter::default();
    let mut seen = Vec::new();
    let mut offset: Option<String> = None;
    loop {
        let mut page = AlarmDefinitionRepo::list(&store, "t1", &filter, offset.as_deref(), 3)
            .await
            .unwrap();
        let more = page.len() > 3;
        page.truncate(3);
        offset = page.last().map(|r| r.id.clone());
        seen.extend(page.into_iter().map(|r| r.id));
        if !more {
            break;
        }
    }
    assert_eq!(seen, expected);
}

#[tokio::test]
async fn invalid_stored_expression_is_rejected_on_create() {
    let (_dir, store) = setup().await;
    let err = AlarmDefinitionRepo::create(&store, "t1", &definition("bad", "avg(cpu) >"))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Expression(_)));
}
