use std::fmt;

/// One category of managed content. Each domain owns a subdirectory of the
/// workspace and a named search index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Rules,
    Knowledge,
    Todos,
    History,
    Database,
    Backups,
}

impl Domain {
    /// Every domain, in the fixed order reloads run in.
    pub const ALL: [Domain; 6] = [
        Domain::Rules,
        Domain::Knowledge,
        Domain::Database,
        Domain::Todos,
        Domain::History,
        Domain::Backups,
    ];

    /// Workspace subdirectory holding this domain's source files.
    pub fn dir_name(self) -> &'static str {
        match self {
            Domain::Rules => "rules",
            Domain::Knowledge => "knowledge",
            Domain::Todos => "todos",
            Domain::History => "history",
            Domain::Database => "database",
            Domain::Backups => "backups",
        }
    }

    pub fn as_str(self) -> &'static str {
        self.dir_name()
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
