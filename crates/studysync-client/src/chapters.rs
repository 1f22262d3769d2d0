//! The study's chapter list.

use studysync_types::{ChapterId, ChapterSummary};

#[derive(Debug, Clone, Default)]
pub struct ChapterRegistry {
    list: Vec<ChapterSummary>,
}

impl ChapterRegistry {
    pub fn new(list: Vec<ChapterSummary>) -> Self {
        Self { list }
    }

    pub fn replace(&mut self, list: Vec<ChapterSummary>) {
        self.list = list;
    }

    pub fn list(&self) -> &[ChapterSummary] {
        &self.list
    }

    pub fn get(&self, id: &ChapterId) -> Option<&ChapterSummary> {
        self.list.iter().find(|c| &c.id == id)
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}
