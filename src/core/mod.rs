pub mod error;
pub mod gantt;
pub mod state;

pub use error::SimError;
pub use gantt::{EventKind, GanttBuilder, GanttLabel, GanttSegment, TimelineEvent};
pub use state::{
    CoreId, Pid, ProcId, ProcTable, Process, ProcessSpec, Rank, ReadyQueue, TaskClass, Ticks,
};
