/// Canonical identity of one tool in the lightweight aviation tool set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolIdentity {
    pub key: &'static str,
    pub aliases: &'static [&'static str],
    pub label: &'static str,
    pub color: &'static str,
}

impl ToolIdentity {
    fn matches_exact(&self, label: &str) -> bool {
        self.key == label || self.aliases.contains(&label)
    }

    fn matches_ignoring_case(&self, label: &str) -> bool {
        self.key.eq_ignore_ascii_case(label)
            || self
                .aliases
                .iter()
                .any(|alias| alias.eq_ignore_ascii_case(label))
    }
}

pub const REGISTRY_SIZE: usize = 11;

/// Color drawn for labels the registry does not know.
pub const UNKNOWN_TOOL_COLOR: &str = "red";

/// Fixed registry; its order is the slot order of every image result.
pub static TOOL_REGISTRY: [ToolIdentity; REGISTRY_SIZE] = [
    ToolIdentity {
        key: "Adjustable_wrench",
        aliases: &[],
        label: "Adjustable wrench",
        color: "teal",
    },
    ToolIdentity {
        key: "screwdriver_1",
        aliases: &[],
        label: "Flat screwdriver (-)",
        color: "blue",
    },
    ToolIdentity {
        key: "screwdriver_2",
        aliases: &[],
        label: "Phillips screwdriver (+)",
        color: "green",
    },
    ToolIdentity {
        key: "Offset_Phillips_screwdriver",
        aliases: &["Offset_Phillips"],
        label: "Offset Phillips screwdriver",
        color: "orange",
    },
    ToolIdentity {
        key: "Side_cutters",
        aliases: &[],
        label: "Side cutters",
        color: "purple",
    },
    ToolIdentity {
        key: "Shernica",
        aliases: &[],
        label: "Shernica",
        color: "pink",
    },
    ToolIdentity {
        key: "Safety_pliers",
        aliases: &[],
        label: "Safety wire pliers",
        color: "cyan",
    },
    ToolIdentity {
        key: "Pliers",
        aliases: &[],
        label: "Pliers",
        color: "yellow",
    },
    ToolIdentity {
        key: "Rotary_wheel",
        aliases: &[],
        label: "Brace",
        color: "brown",
    },
    ToolIdentity {
        key: "Open_end_wrench",
        aliases: &[],
        label: "Combination wrench 3/4",
        color: "lime",
    },
    ToolIdentity {
        key: "Oil_can_opener",
        aliases: &[],
        label: "Oil can opener",
        color: "magenta",
    },
];

/// Registry slot for a raw model label: exact key or alias first, then ASCII case-insensitive.
pub fn resolve(label: &str) -> Option<usize> {
    let label = label.trim();
    TOOL_REGISTRY
        .iter()
        .position(|tool| tool.matches_exact(label))
        .or_else(|| {
            TOOL_REGISTRY
                .iter()
                .position(|tool| tool.matches_ignoring_case(label))
        })
}
