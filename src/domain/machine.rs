// Machine domain model
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    pub id: String,
    #[serde(rename = "type", default)]
    pub machine_type: String,
    #[serde(default)]
    pub name: String,
}

impl Machine {
    #[cfg(test)]
    pub fn new(id: String, machine_type: String) -> Self {
        let name = Self::format_name(&id);
        Self {
            id,
            machine_type,
            name,
        }
    }

    /// Fill in the display name for machines decoded from the backend.
    pub fn with_display_name(mut self) -> Self {
        if self.name.is_empty() {
            self.name = Self::format_name(&self.id);
        }
        self
    }

    fn format_name(id: &str) -> String {
        // Convert "robot_arm_01" to "Robot Arm 01"
        id.trim_matches('_')
            .split('_')
            .filter(|part| !part.is_empty())
            .map(|part| {
                let mut chars = part.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_name() {
        let machine = Machine::new("robot_01".to_string(), "robotic_arm".to_string());
        assert_eq!(machine.name, "Robot 01");

        let machine = Machine::new("cnc__mill_".to_string(), "cnc_machine".to_string());
        assert_eq!(machine.name, "Cnc Mill");
    }

    #[test]
    fn test_decode_backend_machine() {
        let machine: Machine =
            serde_json::from_str(r#"{"id":"armpi_fpv_01","type":"robotic_arm"}"#).unwrap();
        let machine = machine.with_display_name();
        assert_eq!(machine.machine_type, "robotic_arm");
        assert_eq!(machine.name, "Armpi Fpv 01");
    }
}
