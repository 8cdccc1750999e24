/// A named tenant within the store. In single-project mode the only project
/// is `"default"`; in multi-project mode each project owns its own on-disk
/// database under `<projects_dir>/<name>/store.db`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Project {
    pub name: String,
}

impl Project {
    pub const DEFAULT_NAME: &'static str = "default";

    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn default_project() -> Self {
        Self::new(Self::DEFAULT_NAME)
    }
}
