//! Client configuration

use ads_core::PrimitiveKind;
use ads_transport::{NotificationAttrib, TransmissionMode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Attributes applied to every push subscription
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    pub transmission_mode: TransmissionMode,
    /// Longest the device may hold back a sample
    pub max_delay: Duration,
    /// Device-side sampling period
    pub cycle_time: Duration,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            transmission_mode: TransmissionMode::ServerOnChange,
            max_delay: Duration::ZERO,
            cycle_time: Duration::ZERO,
        }
    }
}

impl NotificationSettings {
    /// Build subscription attributes for a sample of `length` bytes
    pub fn attrib(&self, length: usize) -> NotificationAttrib {
        NotificationAttrib {
            length,
            transmission_mode: self.transmission_mode,
            max_delay: self.max_delay,
            cycle_time: self.cycle_time,
        }
    }
}

/// Client configuration
///
/// # Example
///
/// ```rust
/// use ads_client::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::default()
///     .with_call_timeout(Duration::from_secs(2))
///     .with_thread_name_prefix("plc");
/// assert_eq!(config.thread_name_prefix, "plc");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub notification: NotificationSettings,
    /// How long a poll thread waits for its queued read
    ///
    /// `None` waits until the device worker gets to it.
    pub call_timeout: Option<Duration>,
    /// Prefix of device and poll thread names
    pub thread_name_prefix: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            notification: NotificationSettings::default(),
            call_timeout: None,
            thread_name_prefix: "ads".to_string(),
        }
    }
}

impl ClientConfig {
    pub fn with_notification(mut self, notification: NotificationSettings) -> Self {
        self.notification = notification;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }
}

/// Decoding overrides for device-reported types
///
/// Consulted before the built-in type table, by numeric type id first and
/// then by type name. The table is filled by the host application only.
#[derive(Debug, Clone, Default)]
pub struct CustomTypes {
    by_id: HashMap<u32, PrimitiveKind>,
    by_name: HashMap<String, PrimitiveKind>,
}

impl CustomTypes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an override for a numeric type id
    pub fn with_type_id(mut self, type_id: u32, kind: PrimitiveKind) -> Self {
        self.by_id.insert(type_id, kind);
        self
    }

    /// Add an override for a type name such as `"ST_Axis"`
    pub fn with_type_name(mut self, type_name: &str, kind: PrimitiveKind) -> Self {
        self.by_name.insert(type_name.to_string(), kind);
        self
    }

    pub fn by_id(&self, type_id: u32) -> Option<&PrimitiveKind> {
        self.by_id.get(&type_id)
    }

    pub fn by_name(&self, type_name: &str) -> Option<&PrimitiveKind> {
        self.by_name.get(type_name)
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty() && self.by_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.call_timeout, None);
        assert_eq!(config.thread_name_prefix, "ads");
        assert_eq!(
            config.notification.transmission_mode,
            TransmissionMode::ServerOnChange
        );
    }

    #[test]
    fn test_deserialize_partial_config() {
        let config: ClientConfig = serde_json::from_str(
            r#"{
                "notification": { "transmission_mode": "server_cycle" },
                "call_timeout": { "secs": 2, "nanos": 0 }
            }"#,
        )
        .unwrap();
        assert_eq!(config.call_timeout, Some(Duration::from_secs(2)));
        assert_eq!(
            config.notification.transmission_mode,
            TransmissionMode::ServerCycle
        );
        assert_eq!(config.notification.max_delay, Duration::ZERO);
        assert_eq!(config.thread_name_prefix, "ads");
    }

    #[test]
    fn test_notification_attrib() {
        let settings = NotificationSettings {
            cycle_time: Duration::from_millis(10),
            ..Default::default()
        };
        let attrib = settings.attrib(8);
        assert_eq!(attrib.length, 8);
        assert_eq!(attrib.cycle_time, Duration::from_millis(10));
    }

    #[test]
    fn test_custom_types_lookup() {
        let types = CustomTypes::new()
            .with_type_id(65, PrimitiveKind::UInt16)
            .with_type_name("E_State", PrimitiveKind::Int16);
        assert_eq!(types.by_id(65), Some(&PrimitiveKind::UInt16));
        assert_eq!(types.by_name("E_State"), Some(&PrimitiveKind::Int16));
        assert_eq!(types.by_id(2), None);
        assert!(!types.is_empty());
        assert!(CustomTypes::new().is_empty());
    }
}
