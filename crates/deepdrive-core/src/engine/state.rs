/// Where the pipeline controller stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Stages of `round` are being built or executed.
    Building { round: usize },
    Done,
}

/// Decision taken when a round's detect stage reports completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Next(usize),
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Every configured round ran.
    MaxIterations,
    /// A simulate manager found no seeds at the start of `round`.
    SeedsExhausted { round: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub rounds_completed: usize,
    pub stages_executed: usize,
    pub termination: Termination,
}
