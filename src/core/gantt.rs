use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::state::{CoreId, Pid, TaskClass, Ticks};

/// Execution-slot owner: a process or the idle sentinel. Wire form is
/// `"P<pid>"` / `"IDLE"` for compatibility with the gantt consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GanttLabel {
    Idle,
    Proc(Pid),
}

impl GanttLabel {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

impl fmt::Display for GanttLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("IDLE"),
            Self::Proc(pid) => write!(f, "P{pid}"),
        }
    }
}

impl FromStr for GanttLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "IDLE" {
            return Ok(Self::Idle);
        }
        s.strip_prefix('P')
            .and_then(|rest| rest.parse::<Pid>().ok())
            .map(Self::Proc)
            .ok_or_else(|| format!("expected \"IDLE\" or \"P<pid>\", got {s:?}"))
    }
}

impl Serialize for GanttLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for GanttLabel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GanttSegment {
    #[serde(rename = "process")]
    pub label: GanttLabel,
    pub start: Ticks,
    pub end: Ticks,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub core: Option<CoreId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<TaskClass>,
}

impl GanttSegment {
    pub fn duration(&self) -> Ticks {
        self.end - self.start
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Completion,
}

/// Emitted exactly once per completed process, in completion order.
#[derive(Debug, Clone, Serialize)]
pub struct TimelineEvent {
    pub time: Ticks,
    #[serde(rename = "process")]
    pub pid: Pid,
    pub event: EventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<TaskClass>,
}

impl TimelineEvent {
    pub fn completion(time: Ticks, pid: Pid, classification: Option<TaskClass>) -> Self {
        Self {
            time,
            pid,
            event: EventKind::Completion,
            classification,
        }
    }
}

/// Accumulates one core's gantt. Keeps segments contiguous over
/// `[0, makespan)`: gaps before a recorded run become IDLE segments, and
/// consecutive segments with the same label are merged.
#[derive(Debug)]
pub struct GanttBuilder {
    segments: Vec<GanttSegment>,
    core: Option<CoreId>,
}

impl GanttBuilder {
    pub fn new() -> Self {
        Self {
            segments: Vec::new(),
            core: None,
        }
    }

    pub fn for_core(core: CoreId) -> Self {
        Self {
            segments: Vec::new(),
            core: Some(core),
        }
    }

    /// End of the last segment so far (0 when nothing is recorded).
    pub fn end(&self) -> Ticks {
        self.segments.last().map_or(0, |seg| seg.end)
    }

    pub fn run(&mut self, pid: Pid, start: Ticks, end: Ticks, classification: Option<TaskClass>) {
        debug_assert!(start < end, "empty execution slice for P{pid}");
        debug_assert!(start >= self.end(), "overlapping gantt segment for P{pid}");
        if start > self.end() {
            self.idle(self.end(), start);
        }
        self.push(GanttLabel::Proc(pid), start, end, classification);
    }

    pub fn idle(&mut self, start: Ticks, end: Ticks) {
        if start == end {
            return;
        }
        debug_assert!(start == self.end(), "idle segment must abut the last one");
        self.push(GanttLabel::Idle, start, end, None);
    }

    /// Extends the trailing IDLE up to `t`; used to cover a core that sits
    /// idle after its last dispatch until the global makespan.
    pub fn pad_idle_to(&mut self, t: Ticks) {
        let end = self.end();
        if t > end {
            self.idle(end, t);
        }
    }

    fn push(&mut self, label: GanttLabel, start: Ticks, end: Ticks, class: Option<TaskClass>) {
        if let Some(last) = self.segments.last_mut()
            && last.label == label
            && last.end == start
        {
            last.end = end;
            return;
        }
        self.segments.push(GanttSegment {
            label,
            start,
            end,
            core: self.core,
            classification: class,
        });
    }

    pub fn finish(self) -> Vec<GanttSegment> {
        self.segments
    }
}

impl Default for GanttBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_round_trips_through_wire_form() {
        assert_eq!(GanttLabel::Proc(12).to_string(), "P12");
        assert_eq!(GanttLabel::Idle.to_string(), "IDLE");
        assert_eq!("P3".parse::<GanttLabel>().unwrap(), GanttLabel::Proc(3));
        assert_eq!("IDLE".parse::<GanttLabel>().unwrap(), GanttLabel::Idle);
        assert!("Q7".parse::<GanttLabel>().is_err());
    }

    #[test]
    fn gaps_are_filled_with_idle() {
        let mut builder = GanttBuilder::new();
        builder.run(1, 0, 3, None);
        builder.run(2, 5, 7, None);
        let segments = builder.finish();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[1].label, GanttLabel::Idle);
        assert_eq!((segments[1].start, segments[1].end), (3, 5));
    }

    #[test]
    fn consecutive_same_label_segments_merge() {
        let mut builder = GanttBuilder::new();
        builder.run(1, 0, 2, None);
        builder.run(1, 2, 4, None);
        builder.run(2, 4, 5, None);
        let segments = builder.finish();
        assert_eq!(segments.len(), 2);
        assert_eq!((segments[0].start, segments[0].end), (0, 4));
    }

    #[test]
    fn leading_gap_becomes_idle() {
        let mut builder = GanttBuilder::for_core(1);
        builder.run(4, 6, 8, None);
        builder.pad_idle_to(10);
        let segments = builder.finish();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].label, GanttLabel::Idle);
        assert_eq!((segments[0].start, segments[0].end), (0, 6));
        assert_eq!((segments[2].start, segments[2].end), (8, 10));
        assert!(segments.iter().all(|seg| seg.core == Some(1)));
    }

    #[test]
    fn segment_serializes_with_wire_field_names() {
        let seg = GanttSegment {
            label: GanttLabel::Proc(1),
            start: 0,
            end: 5,
            core: None,
            classification: None,
        };
        let json = serde_json::to_value(&seg).unwrap();
        assert_eq!(json["process"], "P1");
        assert_eq!(json["start"], 0);
        assert_eq!(json["end"], 5);
        assert!(json.get("core").is_none());
    }
}
