#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
}

/// Commands whose remainder is a free-text prompt.
pub(crate) const PROMPT_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "route",
        action: "route",
    },
    CommandSpec {
        command: "refine",
        action: "refine",
    },
    CommandSpec {
        command: "explain",
        action: "explain",
    },
    CommandSpec {
        command: "video",
        action: "video",
    },
];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "help",
        action: "help",
    },
    CommandSpec {
        command: "tools",
        action: "list_tools",
    },
    CommandSpec {
        command: "status",
        action: "status",
    },
    CommandSpec {
        command: "reset",
        action: "reset",
    },
    CommandSpec {
        command: "quit",
        action: "quit",
    },
    CommandSpec {
        command: "exit",
        action: "quit",
    },
];

pub const CHAT_HELP_COMMANDS: &[&str] = &[
    "/route",
    "/refine",
    "/explain",
    "/video",
    "/tools",
    "/status",
    "/reset",
    "/help",
    "/quit",
];
