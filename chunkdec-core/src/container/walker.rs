use crate::domain::{ChunkInfo, ChunkReference, StorageHostChunkList};

/// What the walker decided about one declared chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step<'a> {
    /// Starts at the running offset; its `chunk_length` bytes are next in
    /// the stream.
    Kept {
        reference: ChunkReference,
        info: &'a ChunkInfo,
    },
    /// Points behind the running offset, i.e. at bytes already consumed.
    /// Owns no stream bytes.
    Duplicate {
        reference: ChunkReference,
        info: &'a ChunkInfo,
    },
    /// Points past the running offset. Always the last step of a walk.
    Misordered {
        reference: ChunkReference,
        info: &'a ChunkInfo,
        expected: u64,
    },
}

impl<'a> Step<'a> {
    pub fn keep(&self) -> bool {
        matches!(self, Step::Kept { .. })
    }

    pub fn reference(&self) -> ChunkReference {
        match *self {
            Step::Kept { reference, .. }
            | Step::Duplicate { reference, .. }
            | Step::Misordered { reference, .. } => reference,
        }
    }

    pub fn info(&self) -> &'a ChunkInfo {
        match *self {
            Step::Kept { info, .. }
            | Step::Duplicate { info, .. }
            | Step::Misordered { info, .. } => info,
        }
    }

    /// Stream bytes owned by this step.
    pub fn stream_len(&self) -> u64 {
        match self {
            Step::Kept { info, .. } => info.chunk_length as u64,
            _ => 0,
        }
    }
}

/// Walks a container's chunk infos in declaration order, tracking how far
/// into the stream the kept chunks reach.
pub struct OffsetWalker<'a> {
    infos: std::iter::Enumerate<std::slice::Iter<'a, ChunkInfo>>,
    container_index: u64,
    expected: u64,
    done: bool,
}

impl<'a> OffsetWalker<'a> {
    pub fn new(container: &'a StorageHostChunkList, container_index: u64) -> Self {
        Self::over(&container.chunk_infos, container_index)
    }

    pub fn over(infos: &'a [ChunkInfo], container_index: u64) -> Self {
        Self {
            infos: infos.iter().enumerate(),
            container_index,
            expected: 0,
            done: false,
        }
    }

    /// Stream offset the next kept chunk must start at.
    pub fn expected_offset(&self) -> u64 {
        self.expected
    }
}

impl<'a> Iterator for OffsetWalker<'a> {
    type Item = Step<'a>;

    fn next(&mut self) -> Option<Step<'a>> {
        if self.done {
            return None;
        }
        let (i, info) = self.infos.next()?;
        let reference = ChunkReference::new(self.container_index, i as u64);
        let offset = info.chunk_offset as u64;

        if offset > self.expected {
            self.done = true;
            Some(Step::Misordered {
                reference,
                info,
                expected: self.expected,
            })
        } else if offset < self.expected {
            Some(Step::Duplicate { reference, info })
        } else {
            self.expected += info.chunk_length as u64;
            Some(Step::Kept { reference, info })
        }
    }
}

impl std::iter::FusedIterator for OffsetWalker<'_> {}
