#![forbid(unsafe_code)]

pub mod plan;

pub use plan::{
    ColumnSpec, DefaultValue, MappingRule, MigrationPlan, PlanError, StatusPolicy, catalog,
};

pub mod ids {
    const MAX_IDENT_LEN: usize = 64;

    /// A table or column name that is safe to splice into SQL once quoted.
    #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct SqlIdent(String);

    impl SqlIdent {
        pub fn as_str(&self) -> &str {
            &self.0
        }

        pub fn try_new(value: impl Into<String>) -> Result<Self, SqlIdentError> {
            let value = value.into();
            validate_sql_ident(&value)?;
            Ok(Self(value))
        }

        /// Double-quoted form for use inside statements.
        pub fn quoted(&self) -> String {
            format!("\"{}\"", self.0)
        }
    }

    impl std::fmt::Display for SqlIdent {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(&self.0)
        }
    }

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum SqlIdentError {
        Empty,
        TooLong,
        InvalidFirstChar,
        InvalidChar { ch: char, index: usize },
    }

    impl std::fmt::Display for SqlIdentError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Self::Empty => write!(f, "identifier is empty"),
                Self::TooLong => write!(f, "identifier exceeds {MAX_IDENT_LEN} chars"),
                Self::InvalidFirstChar => {
                    write!(f, "identifier must start with a letter or underscore")
                }
                Self::InvalidChar { ch, index } => {
                    write!(f, "identifier has invalid char {ch:?} at {index}")
                }
            }
        }
    }

    impl std::error::Error for SqlIdentError {}

    fn validate_sql_ident(value: &str) -> Result<(), SqlIdentError> {
        if value.is_empty() {
            return Err(SqlIdentError::Empty);
        }
        if value.len() > MAX_IDENT_LEN {
            return Err(SqlIdentError::TooLong);
        }
        let Some(first) = value.chars().next() else {
            return Err(SqlIdentError::Empty);
        };
        if !(first.is_ascii_alphabetic() || first == '_') {
            return Err(SqlIdentError::InvalidFirstChar);
        }
        for (index, ch) in value.chars().enumerate().skip(1) {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                continue;
            }
            return Err(SqlIdentError::InvalidChar { ch, index });
        }
        Ok(())
    }

    /// Ledger identity of a schema transformation: `(app, name)`.
    #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct MigrationKey {
        app: String,
        name: String,
    }

    impl MigrationKey {
        pub fn try_new(
            app: impl Into<String>,
            name: impl Into<String>,
        ) -> Result<Self, MigrationKeyError> {
            let app = app.into();
            let name = name.into();
            if app.is_empty() {
                return Err(MigrationKeyError::EmptyApp);
            }
            if let Some(ch) = app
                .chars()
                .find(|ch| !(ch.is_ascii_lowercase() || ch.is_ascii_digit() || *ch == '_'))
            {
                return Err(MigrationKeyError::InvalidAppChar(ch));
            }
            if name.is_empty() {
                return Err(MigrationKeyError::EmptyName);
            }
            if let Some(ch) = name
                .chars()
                .find(|ch| !(ch.is_ascii_alphanumeric() || *ch == '_'))
            {
                return Err(MigrationKeyError::InvalidNameChar(ch));
            }
            Ok(Self { app, name })
        }

        /// Accepts `app.name` or `app/name`.
        pub fn parse(value: &str) -> Result<Self, MigrationKeyError> {
            let value = value.trim();
            let Some((app, name)) = value.split_once(['.', '/']) else {
                return Err(MigrationKeyError::MissingSeparator);
            };
            Self::try_new(app, name)
        }

        pub fn app(&self) -> &str {
            &self.app
        }

        pub fn name(&self) -> &str {
            &self.name
        }
    }

    impl std::fmt::Display for MigrationKey {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{}.{}", self.app, self.name)
        }
    }

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum MigrationKeyError {
        MissingSeparator,
        EmptyApp,
        EmptyName,
        InvalidAppChar(char),
        InvalidNameChar(char),
    }

    impl std::fmt::Display for MigrationKeyError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Self::MissingSeparator => write!(f, "migration must look like <app>.<name>"),
                Self::EmptyApp => write!(f, "migration app is empty"),
                Self::EmptyName => write!(f, "migration name is empty"),
                Self::InvalidAppChar(ch) => write!(f, "migration app has invalid char {ch:?}"),
                Self::InvalidNameChar(ch) => write!(f, "migration name has invalid char {ch:?}"),
            }
        }
    }

    impl std::error::Error for MigrationKeyError {}
}

pub mod status {
    /// Lifecycle of a milestone or task. Closed set; parse at the boundary.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub enum Status {
        #[default]
        NotStarted,
        InProgress,
        Completed,
    }

    impl Status {
        pub const ALL: [Status; 3] = [Self::NotStarted, Self::InProgress, Self::Completed];

        pub fn as_str(self) -> &'static str {
            match self {
                Self::NotStarted => "not_started",
                Self::InProgress => "in_progress",
                Self::Completed => "completed",
            }
        }

        pub fn parse(value: &str) -> Option<Self> {
            match value.trim() {
                "not_started" => Some(Self::NotStarted),
                "in_progress" => Some(Self::InProgress),
                "completed" => Some(Self::Completed),
                _ => None,
            }
        }

        /// `'not_started', 'in_progress', 'completed'` for `IN (...)` clauses.
        pub fn sql_list() -> String {
            Self::ALL
                .iter()
                .map(|status| format!("'{}'", status.as_str()))
                .collect::<Vec<_>>()
                .join(", ")
        }
    }

    impl std::fmt::Display for Status {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(self.as_str())
        }
    }

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub struct UnknownStatus(pub String);

    impl std::fmt::Display for UnknownStatus {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "unknown status {:?}", self.0)
        }
    }

    impl std::error::Error for UnknownStatus {}

    impl std::str::FromStr for Status {
        type Err = UnknownStatus;

        fn from_str(value: &str) -> Result<Self, Self::Err> {
            Self::parse(value).ok_or_else(|| UnknownStatus(value.to_string()))
        }
    }
}
