//! Execution trace sink.
//!
//! The runner writes its verbose execution trace as free-form text chunks
//! into a [`TraceSink`] passed explicitly to [`crate::runner::CrewRunner::kickoff`].
//! Chunks are not line-aligned: a single chunk may hold part of a line or
//! several lines.

/// Structural marker written when an agent starts working on a task.
pub const CHAIN_ENTERED: &str = "Entering new agent-execution chain";

/// Structural marker written when an agent has produced its final answer.
pub const CHAIN_FINISHED: &str = "Finished chain.";

/// Receiver for trace text emitted during a crew run.
pub trait TraceSink: Send {
    /// Accept one chunk of trace text.
    fn write_chunk(&mut self, chunk: &str);
}

/// Collects the whole trace into one string.
impl TraceSink for String {
    fn write_chunk(&mut self, chunk: &str) {
        self.push_str(chunk);
    }
}

/// Keeps every chunk as written, preserving chunk boundaries.
impl TraceSink for Vec<String> {
    fn write_chunk(&mut self, chunk: &str) {
        self.push(chunk.to_string());
    }
}

/// Discards the trace.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl TraceSink for NullSink {
    fn write_chunk(&mut self, _chunk: &str) {}
}
