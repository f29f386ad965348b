pub mod alarm_action;
pub mod alarm_definition;
pub mod alarm_definition_dimension;
pub mod notification_method;
