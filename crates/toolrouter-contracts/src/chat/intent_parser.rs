use std::collections::BTreeMap;

use serde_json::Value;

use super::command_registry::{CommandSpec, NO_ARG_COMMANDS, PROMPT_ARG_COMMANDS};

#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub action: String,
    pub raw: String,
    pub prompt: Option<String>,
    pub command_args: BTreeMap<String, Value>,
}

impl Intent {
    fn new(action: &str, raw: &str) -> Self {
        Self {
            action: action.to_string(),
            raw: raw.to_string(),
            prompt: None,
            command_args: BTreeMap::new(),
        }
    }
}

fn find_action(command: &str, specs: &[CommandSpec]) -> Option<&'static str> {
    specs
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.action)
}

/// Parse one chat line. Plain text becomes a `route` intent; `/command arg`
/// lines map through the command registry.
pub fn parse_intent(text: &str) -> Intent {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return Intent::new("noop", text);
    }

    if let Some(slash_tail) = raw_trimmed.strip_prefix('/') {
        let command_len = slash_tail
            .chars()
            .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
            .count();
        if command_len > 0 {
            let command = slash_tail[..command_len].to_ascii_lowercase();
            let arg = slash_tail[command_len..].trim();

            if let Some(action) = find_action(&command, PROMPT_ARG_COMMANDS) {
                let mut intent = Intent::new(action, text);
                if !arg.is_empty() {
                    intent.prompt = Some(arg.to_string());
                }
                return intent;
            }

            if let Some(action) = find_action(&command, NO_ARG_COMMANDS) {
                return Intent::new(action, text);
            }

            let mut intent = Intent::new("unknown", text);
            intent
                .command_args
                .insert("command".to_string(), Value::String(command));
            intent
                .command_args
                .insert("arg".to_string(), Value::String(arg.to_string()));
            return intent;
        }
    }

    let mut intent = Intent::new("route", text);
    intent.prompt = Some(raw_trimmed.to_string());
    intent
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::parse_intent;

    #[test]
    fn blank_lines_are_noop() {
        assert_eq!(parse_intent("").action, "noop");
        assert_eq!(parse_intent("   \t ").action, "noop");
    }

    #[test]
    fn plain_text_routes_trimmed_prompt() {
        let intent = parse_intent("  Create a logo for a coffee shop \n");
        assert_eq!(intent.action, "route");
        assert_eq!(
            intent.prompt.as_deref(),
            Some("Create a logo for a coffee shop")
        );
    }

    #[test]
    fn prompt_commands_capture_remainder() {
        let refine = parse_intent("/refine um make a video of the sea");
        assert_eq!(refine.action, "refine");
        assert_eq!(refine.prompt.as_deref(), Some("um make a video of the sea"));

        let explain = parse_intent("/EXPLAIN a poster");
        assert_eq!(explain.action, "explain");
        assert_eq!(explain.prompt.as_deref(), Some("a poster"));

        let video = parse_intent("/video   waves at dusk  ");
        assert_eq!(video.action, "video");
        assert_eq!(video.prompt.as_deref(), Some("waves at dusk"));
    }

    #[test]
    fn prompt_commands_without_argument_have_no_prompt() {
        let intent = parse_intent("/route");
        assert_eq!(intent.action, "route");
        assert!(intent.prompt.is_none());
    }

    #[test]
    fn no_arg_commands_map_to_actions() {
        assert_eq!(parse_intent("/help").action, "help");
        assert_eq!(parse_intent("/tools").action, "list_tools");
        assert_eq!(parse_intent("/status").action, "status");
        assert_eq!(parse_intent("/reset").action, "reset");
        assert_eq!(parse_intent("/quit").action, "quit");
        assert_eq!(parse_intent("/exit").action, "quit");
    }

    #[test]
    fn parse_unknown_command() {
        let intent = parse_intent("/magic foo bar");
        assert_eq!(intent.action, "unknown");
        assert_eq!(intent.command_args["command"], json!("magic"));
        assert_eq!(intent.command_args["arg"], json!("foo bar"));
    }

    #[test]
    fn lone_slash_is_routed_as_text() {
        let intent = parse_intent("/ ");
        assert_eq!(intent.action, "route");
        assert_eq!(intent.prompt.as_deref(), Some("/"));
    }
}
