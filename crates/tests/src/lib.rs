//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 端到端测试：write → 聚合 → 组批 → output runner → sink
//! - 配置驱动的 daemon 构建

#[cfg(test)]
mod support;

#[cfg(test)]
mod e2e_tests;

#[cfg(test)]
mod config_tests;

#[cfg(test)]
mod contract_tests {
    use contracts::{DaemonSettings, Message, ATTRIBUTE_AGGREGATE};

    #[test]
    fn test_default_settings_are_valid() {
        let settings = DaemonSettings::default();
        assert!(settings.check().is_ok());
        assert!(!settings.aggregation_enabled());
    }

    #[test]
    fn test_message_wire_shape() {
        let message = Message::new("payload").with_attribute("k", "v");
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["attributes"]["k"], "v");

        let back: Message = serde_json::from_value(json).unwrap();
        assert_eq!(back, message);
        assert!(!back.is_aggregate());
        assert!(Message::new("x")
            .with_attribute(ATTRIBUTE_AGGREGATE, true)
            .is_aggregate());
    }
}
