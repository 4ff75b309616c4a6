use serde::Deserialize;

/// The `initializationOptions` object a client may send inside `initialize` params.
/// Every field is optional; an absent field leaves the current value untouched.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializationOptions {
    pub build_options: Option<Vec<String>>,
    pub max_number_of_problems: Option<usize>,
    #[serde(rename = "deviceID")]
    pub device_id: Option<u32>,
}

/// Resolved server configuration, held by the LSP glue alongside the document store.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub build_options: Vec<String>,
    pub max_problems: usize,
    pub device_id: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            build_options: Vec::new(),
            max_problems: 100,
            device_id: 0,
        }
    }
}

impl ServerConfig {
    /// Merge a client-supplied `initializationOptions` object in, leaving fields the
    /// client didn't mention at their current value.
    pub fn apply(&mut self, options: InitializationOptions) {
        if let Some(build_options) = options.build_options {
            self.build_options = build_options;
        }
        if let Some(max_problems) = options.max_number_of_problems {
            self.max_problems = max_problems;
        }
        if let Some(device_id) = options.device_id {
            self.device_id = device_id;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_fields_leave_defaults_untouched() {
        let mut config = ServerConfig::default();
        config.apply(InitializationOptions::default());
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn present_fields_override_defaults() {
        let mut config = ServerConfig::default();
        config.apply(InitializationOptions {
            build_options: Some(vec!["-cl-std=CL2.0".to_string()]),
            max_number_of_problems: Some(10),
            device_id: Some(42),
        });
        assert_eq!(config.build_options, vec!["-cl-std=CL2.0".to_string()]);
        assert_eq!(config.max_problems, 10);
        assert_eq!(config.device_id, 42);
    }

    #[test]
    fn parses_camel_case_json() {
        let json = serde_json::json!({
            "buildOptions": ["-Werror"],
            "maxNumberOfProblems": 5,
            "deviceID": 3,
        });
        let options: InitializationOptions = serde_json::from_value(json).unwrap();
        assert_eq!(options.build_options, Some(vec!["-Werror".to_string()]));
        assert_eq!(options.max_number_of_problems, Some(5));
        assert_eq!(options.device_id, Some(3));
    }
}
