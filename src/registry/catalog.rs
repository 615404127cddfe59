use serde::Serialize;
use serde_json::Value;

use super::{CommandDescriptor, Registry};

/// Serializable view of one parameter, for the `GET /commands` listing.
#[derive(Debug, Clone, Serialize)]
pub struct ParameterEntry {
    pub name: String,
    pub description: String,
    pub kind: String,
    pub positional: bool,
    pub optional: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
}

/// Serializable view of a registered command.
#[derive(Debug, Clone, Serialize)]
pub struct CommandEntry {
    pub name: String,
    pub description: String,
    pub usage: String,
    pub parameters: Vec<ParameterEntry>,
}

pub fn entry(descriptor: &CommandDescriptor) -> CommandEntry {
    CommandEntry {
        name: descriptor.name.clone(),
        description: descriptor.description.clone(),
        usage: descriptor.usage(),
        parameters: descriptor
            .parameters()
            .map(|p| ParameterEntry {
                name: p.name.clone(),
                description: p.description.clone(),
                kind: p.parser.kind_name().to_string(),
                positional: p.positional,
                optional: p.parser.is_optional(),
                choices: p.parser.candidates().to_vec(),
            })
            .collect(),
    }
}

/// Every command as JSON, in registration order.
pub fn to_json(registry: &Registry) -> Value {
    let entries: Vec<CommandEntry> = registry.list_all().iter().map(|d| entry(d)).collect();
    serde_json::to_value(entries).unwrap_or_else(|_| Value::Array(Vec::new()))
}

/// Listing of every command plus a pointer to per-command help.
pub fn general_help(registry: &Registry) -> String {
    let mut lines = vec!["Available commands:".to_string()];
    for descriptor in registry.list_all() {
        lines.push(format!("  {} : {}", descriptor.name, descriptor.description));
    }
    lines.push(String::new());
    lines.push("Type 'help <command>' for details on a command.".to_string());
    lines.join("\n")
}

/// Description, usage line and one `--name : description` line per parameter.
pub fn command_help(descriptor: &CommandDescriptor) -> String {
    let mut lines = vec![
        format!("{} : {}", descriptor.name, descriptor.description),
        format!("Usage: {}", descriptor.usage()),
    ];
    for spec in descriptor.parameters() {
        lines.push(format!("  --{} : {}", spec.name, spec.description));
    }
    lines.join("\n")
}

/// Help for `topic`, falling back to the general listing when the topic is
/// absent or names no registered command.
pub fn help_text(registry: &Registry, topic: Option<&str>) -> String {
    match topic.and_then(|name| registry.lookup(name)) {
        Some(descriptor) => command_help(&descriptor),
        None => general_help(registry),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::registry::{ParamParser, ParameterSpec};

    fn registry() -> Registry {
        let registry = Registry::new();
        registry.register(
            CommandDescriptor::new("add", "Add two integers", |_a, _e| async { Ok(Value::Null) })
                .param(ParameterSpec::positional("a", "left operand", ParamParser::integer(None, None)))
                .param(ParameterSpec::positional("b", "right operand", ParamParser::integer(None, None))),
        );
        registry.register(
            CommandDescriptor::new("choose", "Pick a mode", |_a, _e| async { Ok(Value::Null) })
                .param(ParameterSpec::positional("mode", "", ParamParser::choice(["fast", "safe"]))),
        );
        registry
    }

    #[test]
    fn general_help_lists_commands_in_order() {
        let text = general_help(&registry());
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "Available commands:");
        assert_eq!(lines[1], "  add : Add two integers");
        assert_eq!(lines[2], "  choose : Pick a mode");
        assert!(text.ends_with("Type 'help <command>' for details on a command."));
    }

    #[test]
    fn command_help_includes_usage_and_parameters() {
        let registry = registry();
        let text = help_text(&registry, Some("add"));
        assert_eq!(
            text,
            "add : Add two integers\nUsage: add <a> <b>\n  --a : left operand\n  --b : right operand"
        );
    }

    #[test]
    fn unknown_topic_falls_back_to_general_help() {
        let registry = registry();
        assert_eq!(help_text(&registry, Some("nope")), general_help(&registry));
        assert_eq!(help_text(&registry, None), general_help(&registry));
    }

    #[test]
    fn json_listing_carries_parameter_metadata() {
        let json = to_json(&registry());
        assert_eq!(json[0]["name"], "add");
        assert_eq!(json[0]["usage"], "add <a> <b>");
        assert_eq!(json[0]["parameters"][1]["kind"], "integer");
        assert!(json[0]["parameters"][0].get("choices").is_none());
        assert_eq!(json[1]["parameters"][0]["choices"][1], "safe");
    }
}
