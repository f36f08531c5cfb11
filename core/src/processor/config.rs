//! Response processor configuration.

use crate::error::CoreError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToolExecutionStrategy {
    Sequential,
    Parallel,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum XmlAddingStrategy {
    UserMessage,
    AssistantMessage,
    InlineEdit,
}

#[derive(Clone, Debug)]
pub struct ProcessorConfig {
    pub xml_tool_calling: bool,
    pub native_tool_calling: bool,
    pub execute_tools: bool,
    pub execute_on_stream: bool,
    pub tool_execution_strategy: ToolExecutionStrategy,
    pub xml_adding_strategy: XmlAddingStrategy,
    /// `0` disables the cap.
    pub max_xml_tool_calls: usize,
    /// Upper bound on auto-continue cycles per run; unspecified upstream, so
    /// this picks a small fixed value and exposes it as configuration.
    pub max_auto_continue_cycles: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            xml_tool_calling: true,
            native_tool_calling: true,
            execute_tools: true,
            execute_on_stream: true,
            tool_execution_strategy: ToolExecutionStrategy::Sequential,
            xml_adding_strategy: XmlAddingStrategy::AssistantMessage,
            max_xml_tool_calls: 0,
            max_auto_continue_cycles: 4,
        }
    }
}

impl ProcessorConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.execute_tools && !self.xml_tool_calling && !self.native_tool_calling {
            return Err(CoreError::Configuration(
                "execute_tools requires xml_tool_calling or native_tool_calling to be enabled"
                    .into(),
            ));
        }
        Ok(())
    }

    pub fn xml_cap_reached(&self, accepted_so_far: usize) -> bool {
        self.max_xml_tool_calls > 0 && accepted_so_far >= self.max_xml_tool_calls
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_execute_tools_with_no_format_enabled() {
        let config = ProcessorConfig {
            xml_tool_calling: false,
            native_tool_calling: false,
            execute_tools: true,
            ..ProcessorConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn accepts_execute_tools_with_one_format_enabled() {
        let config = ProcessorConfig {
            xml_tool_calling: true,
            native_tool_calling: false,
            execute_tools: true,
            ..ProcessorConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_cap_never_trips() {
        let config = ProcessorConfig { max_xml_tool_calls: 0, ..ProcessorConfig::default() };
        assert!(!config.xml_cap_reached(1_000));
    }
}
