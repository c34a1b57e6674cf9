//! Caller-owned record of finished runs.
use crate::domain::TestRun;

/// Append-only list of run snapshots, oldest first.
#[derive(Debug, Default, Clone)]
pub struct RunHistory {
    runs: Vec<TestRun>,
}

impl RunHistory {
    #[must_use]
    pub const fn new() -> Self {
        Self { runs: Vec::new() }
    }

    pub fn push(&mut self, run: TestRun) {
        self.runs.push(run);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    #[must_use]
    pub fn latest(&self) -> Option<&TestRun> {
        self.runs.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TestRun> {
        self.runs.iter()
    }
}

impl<'history> IntoIterator for &'history RunHistory {
    type Item = &'history TestRun;
    type IntoIter = std::slice::Iter<'history, TestRun>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
