use crate::pattern::Block;

/// Detached copy of one block. Independent of the session it was copied from.
#[derive(Debug, Clone, Default)]
pub struct Clipboard {
    contents: Option<Block>,
}

impl Clipboard {
    pub fn store(&mut self, block: Block) {
        self.contents = Some(block);
    }

    pub fn block(&self) -> Option<&Block> {
        self.contents.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_none()
    }

    pub fn clear(&mut self) {
        self.contents = None;
    }
}
