//! Recording events and their binary encoding.
//!
//! Every event has a stable integer [`EventTag`]. [`Event::write`] emits
//! the body only; a transport that multiplexes events writes the tag in
//! front of it, which is what [`write_event`] and [`read_event`] do.
//!
//! The high-frequency events (enter, exit, memory and I/O) are recycled
//! through [`pool::EventPools`].

pub mod pool;
pub mod strategy;
pub mod wire;

use std::fmt;
use std::io::{Read, Write};

use thiserror::Error;

use crate::semantics::{StreamType, TimerState};
use strategy::{read_cpu_times, write_cpu_times, CpuTimes, ProcessData, RecorderStrategy, ThreadsInfo, Value, ValueType};
use wire::{DataInput, DataOutput};

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoded string of {0} bytes exceeds 65535")]
    StringTooLong(usize),

    #[error("malformed modified UTF-8 at byte {0}")]
    MalformedUtf(usize),

    #[error("unknown event tag {0}")]
    UnknownTag(i32),

    #[error("invalid {what} ordinal {value}")]
    InvalidOrdinal { what: &'static str, value: i32 },

    #[error("unknown stream type {0:?}")]
    InvalidStreamType(String),

    #[error("map with {0} entries cannot be encoded")]
    TooManyEntries(usize),
}

/// Wire discriminant of an event. Values are fixed; gaps are retired tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum EventTag {
    EnterConfiguration = 0,
    Enter = 1,
    Exit = 2,
    FinishRecording = 3,
    MemoryAllocated = 4,
    MemoryFreedByRecId = 5,
    PrintStatistics = 8,
    Io = 9,
    StartRecording = 10,
    StopTimeRecording = 11,
    EndSystem = 13,
    Register = 14,
    AssignToAll = 15,
    PrintCurrentState = 16,
    NotifyTimer = 17,
    NotifyValueChange = 18,
    ProgramRecordCreation = 19,
    ClearTemporaryData = 20,
}

impl EventTag {
    pub const ALL: [EventTag; 18] = [
        EventTag::EnterConfiguration,
        EventTag::Enter,
        EventTag::Exit,
        EventTag::FinishRecording,
        EventTag::MemoryAllocated,
        EventTag::MemoryFreedByRecId,
        EventTag::PrintStatistics,
        EventTag::Io,
        EventTag::StartRecording,
        EventTag::StopTimeRecording,
        EventTag::EndSystem,
        EventTag::Register,
        EventTag::AssignToAll,
        EventTag::PrintCurrentState,
        EventTag::NotifyTimer,
        EventTag::NotifyValueChange,
        EventTag::ProgramRecordCreation,
        EventTag::ClearTemporaryData,
    ];

    pub fn value(self) -> i32 {
        self as i32
    }

    pub fn from_i32(tag: i32) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.value() == tag)
    }

    /// Whether events with this tag are recycled through a pool.
    pub fn is_pooled(self) -> bool {
        matches!(
            self,
            EventTag::Enter
                | EventTag::Exit
                | EventTag::MemoryAllocated
                | EventTag::MemoryFreedByRecId
                | EventTag::AssignToAll
                | EventTag::Io
                | EventTag::ClearTemporaryData
        )
    }
}

impl fmt::Display for EventTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.value())
    }
}

/// Entering or leaving a monitoring scope.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScopeEvent {
    pub rec_id: Option<String>,
    pub now: i64,
    pub threads_info: ThreadsInfo,
    pub exclude: bool,
}

impl ScopeEvent {
    fn write<W: Write + ?Sized>(&self, out: &mut W) -> Result<(), ProtocolError> {
        out.write_string(self.rec_id.as_deref())?;
        out.write_i64(self.now)?;
        self.threads_info.write(out)?;
        out.write_bool(self.exclude)
    }

    fn read<R: Read + ?Sized>(&mut self, input: &mut R) -> Result<(), ProtocolError> {
        self.rec_id = input.read_string()?;
        self.now = input.read_i64()?;
        self.threads_info.read(input)?;
        self.exclude = input.read_bool()?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FinishRecording {
    pub now: i64,
    pub thread_id: i64,
    pub cpu_times: CpuTimes,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MemoryAllocated {
    pub rec_id: Option<String>,
    pub id: i64,
    pub size: i64,
    pub thread_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MemoryFreedByRecId {
    pub rec_id: Option<String>,
    pub size: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Io {
    pub rec_id: Option<String>,
    pub caller: Option<String>,
    pub bytes: i32,
    pub stream: StreamType,
    pub thread_id: i64,
    pub write: bool,
}

impl Default for Io {
    fn default() -> Self {
        Io { rec_id: None, caller: None, bytes: 0, stream: StreamType::None, thread_id: 0, write: false }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StartRecording {
    pub now: i64,
    pub thread_id: i64,
    pub thread_ticks: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StopTimeRecording {
    pub now: i64,
    pub threads_info: ThreadsInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Register {
    pub thread_id: i64,
    pub new_id: i64,
    pub thread_ticks: i64,
    pub now: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AssignToAll {
    pub rec_id: Option<String>,
    pub enter: bool,
    pub now: i64,
    pub threads_info: ThreadsInfo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyTimer {
    pub id: Option<String>,
    pub now: i64,
    pub thread_id: i64,
    pub state: TimerState,
}

impl Default for NotifyTimer {
    fn default() -> Self {
        NotifyTimer { id: None, now: 0, thread_id: 0, state: TimerState::Start }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NotifyValueChange {
    pub id: Option<String>,
    pub value: Value,
}

/// A recording event.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    EnterConfiguration(Option<String>),
    Enter(ScopeEvent),
    Exit(ScopeEvent),
    FinishRecording(FinishRecording),
    MemoryAllocated(MemoryAllocated),
    MemoryFreedByRecId(MemoryFreedByRecId),
    PrintStatistics(ProcessData),
    Io(Io),
    StartRecording(StartRecording),
    StopTimeRecording(StopTimeRecording),
    EndSystem,
    Register(Register),
    AssignToAll(AssignToAll),
    PrintCurrentState(ProcessData),
    NotifyTimer(NotifyTimer),
    NotifyValueChange(NotifyValueChange),
    ProgramRecordCreation,
    ClearTemporaryData,
}

impl Event {
    /// An empty event of the given kind, ready for [`Event::read`].
    pub fn for_tag(tag: EventTag) -> Event {
        match tag {
            EventTag::EnterConfiguration => Event::EnterConfiguration(None),
            EventTag::Enter => Event::Enter(ScopeEvent::default()),
            EventTag::Exit => Event::Exit(ScopeEvent::default()),
            EventTag::FinishRecording => Event::FinishRecording(FinishRecording::default()),
            EventTag::MemoryAllocated => Event::MemoryAllocated(MemoryAllocated::default()),
            EventTag::MemoryFreedByRecId => Event::MemoryFreedByRecId(MemoryFreedByRecId::default()),
            EventTag::PrintStatistics => Event::PrintStatistics(ProcessData::default()),
            EventTag::Io => Event::Io(Io::default()),
            EventTag::StartRecording => Event::StartRecording(StartRecording::default()),
            EventTag::StopTimeRecording => Event::StopTimeRecording(StopTimeRecording::default()),
            EventTag::EndSystem => Event::EndSystem,
            EventTag::Register => Event::Register(Register::default()),
            EventTag::AssignToAll => Event::AssignToAll(AssignToAll::default()),
            EventTag::PrintCurrentState => Event::PrintCurrentState(ProcessData::default()),
            EventTag::NotifyTimer => Event::NotifyTimer(NotifyTimer::default()),
            EventTag::NotifyValueChange => Event::NotifyValueChange(NotifyValueChange::default()),
            EventTag::ProgramRecordCreation => Event::ProgramRecordCreation,
            EventTag::ClearTemporaryData => Event::ClearTemporaryData,
        }
    }

    pub fn tag(&self) -> EventTag {
        match self {
            Event::EnterConfiguration(_) => EventTag::EnterConfiguration,
            Event::Enter(_) => EventTag::Enter,
            Event::Exit(_) => EventTag::Exit,
            Event::FinishRecording(_) => EventTag::FinishRecording,
            Event::MemoryAllocated(_) => EventTag::MemoryAllocated,
            Event::MemoryFreedByRecId(_) => EventTag::MemoryFreedByRecId,
            Event::PrintStatistics(_) => EventTag::PrintStatistics,
            Event::Io(_) => EventTag::Io,
            Event::StartRecording(_) => EventTag::StartRecording,
            Event::StopTimeRecording(_) => EventTag::StopTimeRecording,
            Event::EndSystem => EventTag::EndSystem,
            Event::Register(_) => EventTag::Register,
            Event::AssignToAll(_) => EventTag::AssignToAll,
            Event::PrintCurrentState(_) => EventTag::PrintCurrentState,
            Event::NotifyTimer(_) => EventTag::NotifyTimer,
            Event::NotifyValueChange(_) => EventTag::NotifyValueChange,
            Event::ProgramRecordCreation => EventTag::ProgramRecordCreation,
            Event::ClearTemporaryData => EventTag::ClearTemporaryData,
        }
    }

    /// Writes the event body, without its tag.
    pub fn write<W: Write + ?Sized>(&self, out: &mut W) -> Result<(), ProtocolError> {
        match self {
            Event::EnterConfiguration(id) => out.write_string(id.as_deref()),
            Event::Enter(e) | Event::Exit(e) => e.write(out),
            Event::FinishRecording(e) => {
                out.write_i64(e.now)?;
                out.write_i64(e.thread_id)?;
                write_cpu_times(out, &e.cpu_times)
            }
            Event::MemoryAllocated(e) => {
                out.write_string(e.rec_id.as_deref())?;
                out.write_i64(e.id)?;
                out.write_i64(e.size)?;
                out.write_i64(e.thread_id)
            }
            Event::MemoryFreedByRecId(e) => {
                out.write_string(e.rec_id.as_deref())?;
                out.write_i64(e.size)
            }
            Event::PrintStatistics(data) | Event::PrintCurrentState(data) => data.write(out),
            Event::Io(e) => {
                out.write_string(e.rec_id.as_deref())?;
                out.write_string(e.caller.as_deref())?;
                out.write_i32(e.bytes)?;
                out.write_utf(e.stream.name())?;
                out.write_i64(e.thread_id)?;
                out.write_bool(e.write)
            }
            Event::StartRecording(e) => {
                out.write_i64(e.now)?;
                out.write_i64(e.thread_id)?;
                out.write_i64(e.thread_ticks)
            }
            Event::StopTimeRecording(e) => {
                out.write_i64(e.now)?;
                e.threads_info.write(out)
            }
            Event::Register(e) => {
                out.write_i64(e.thread_id)?;
                out.write_i64(e.new_id)?;
                out.write_i64(e.thread_ticks)?;
                out.write_i64(e.now)
            }
            Event::AssignToAll(e) => {
                out.write_string(e.rec_id.as_deref())?;
                out.write_bool(e.enter)?;
                out.write_i64(e.now)?;
                e.threads_info.write(out)
            }
            Event::NotifyTimer(e) => {
                out.write_string(e.id.as_deref())?;
                out.write_i64(e.now)?;
                out.write_i64(e.thread_id)?;
                out.write_i32(e.state.ordinal())
            }
            Event::NotifyValueChange(e) => {
                out.write_string(e.id.as_deref())?;
                out.write_i32(e.value.value_type().ordinal())?;
                e.value.write(out)
            }
            Event::EndSystem | Event::ProgramRecordCreation | Event::ClearTemporaryData => Ok(()),
        }
    }

    /// Reads an event body into `self`, keeping its kind.
    pub fn read<R: Read + ?Sized>(&mut self, input: &mut R) -> Result<(), ProtocolError> {
        match self {
            Event::EnterConfiguration(id) => *id = input.read_string()?,
            Event::Enter(e) | Event::Exit(e) => e.read(input)?,
            Event::FinishRecording(e) => {
                e.now = input.read_i64()?;
                e.thread_id = input.read_i64()?;
                e.cpu_times.clear();
                read_cpu_times(input, &mut e.cpu_times)?;
            }
            Event::MemoryAllocated(e) => {
                e.rec_id = input.read_string()?;
                e.id = input.read_i64()?;
                e.size = input.read_i64()?;
                e.thread_id = input.read_i64()?;
            }
            Event::MemoryFreedByRecId(e) => {
                e.rec_id = input.read_string()?;
                e.size = input.read_i64()?;
            }
            Event::PrintStatistics(data) | Event::PrintCurrentState(data) => data.read(input)?,
            Event::Io(e) => {
                e.rec_id = input.read_string()?;
                e.caller = input.read_string()?;
                e.bytes = input.read_i32()?;
                let name = input.read_utf()?;
                e.stream = StreamType::from_name(&name).ok_or(ProtocolError::InvalidStreamType(name))?;
                e.thread_id = input.read_i64()?;
                e.write = input.read_bool()?;
            }
            Event::StartRecording(e) => {
                e.now = input.read_i64()?;
                e.thread_id = input.read_i64()?;
                e.thread_ticks = input.read_i64()?;
            }
            Event::StopTimeRecording(e) => {
                e.now = input.read_i64()?;
                e.threads_info.read(input)?;
            }
            Event::Register(e) => {
                e.thread_id = input.read_i64()?;
                e.new_id = input.read_i64()?;
                e.thread_ticks = input.read_i64()?;
                e.now = input.read_i64()?;
            }
            Event::AssignToAll(e) => {
                e.rec_id = input.read_string()?;
                e.enter = input.read_bool()?;
                e.now = input.read_i64()?;
                e.threads_info.read(input)?;
            }
            Event::NotifyTimer(e) => {
                e.id = input.read_string()?;
                e.now = input.read_i64()?;
                e.thread_id = input.read_i64()?;
                let ordinal = input.read_i32()?;
                e.state = TimerState::from_ordinal(ordinal)
                    .ok_or(ProtocolError::InvalidOrdinal { what: "timer state", value: ordinal })?;
            }
            Event::NotifyValueChange(e) => {
                e.id = input.read_string()?;
                let ordinal = input.read_i32()?;
                let value_type = ValueType::from_ordinal(ordinal)
                    .ok_or(ProtocolError::InvalidOrdinal { what: "value type", value: ordinal })?;
                e.value = Value::read(value_type, input)?;
            }
            Event::EndSystem | Event::ProgramRecordCreation | Event::ClearTemporaryData => {}
        }
        Ok(())
    }

    /// Calls the one strategy method matching this event.
    pub fn dispatch(&self, strategy: &mut dyn RecorderStrategy) {
        match self {
            Event::EnterConfiguration(id) => strategy.enter_configuration(id.as_deref()),
            Event::Enter(e) => strategy.enter(e.rec_id.as_deref(), e.now, &e.threads_info, e.exclude),
            Event::Exit(e) => strategy.exit(e.rec_id.as_deref(), e.now, &e.threads_info, e.exclude),
            Event::FinishRecording(e) => strategy.finish_recording(e.now, e.thread_id, &e.cpu_times),
            Event::MemoryAllocated(e) => {
                strategy.memory_allocated(e.rec_id.as_deref(), e.thread_id, e.id, e.size)
            }
            Event::MemoryFreedByRecId(e) => strategy.memory_freed_by_rec_id(e.rec_id.as_deref(), e.size),
            Event::PrintStatistics(data) => strategy.print_statistics(data),
            Event::Io(e) if e.write => {
                strategy.write_io(e.rec_id.as_deref(), e.caller.as_deref(), e.thread_id, e.bytes, e.stream)
            }
            Event::Io(e) => {
                strategy.read_io(e.rec_id.as_deref(), e.caller.as_deref(), e.thread_id, e.bytes, e.stream)
            }
            Event::StartRecording(e) => strategy.start_recording(e.now, e.thread_id, e.thread_ticks),
            Event::StopTimeRecording(e) => strategy.stop_time_recording(e.now, &e.threads_info),
            Event::EndSystem => strategy.end_system(),
            Event::Register(e) => strategy.register(e.thread_id, e.new_id, e.thread_ticks, e.now),
            Event::AssignToAll(e) => {
                strategy.assign_all_to(e.rec_id.as_deref(), e.enter, e.now, &e.threads_info)
            }
            Event::PrintCurrentState(data) => strategy.print_current_state(data),
            Event::NotifyTimer(e) => strategy.notify_timer(e.id.as_deref(), e.state, e.now, e.thread_id),
            Event::NotifyValueChange(e) => strategy.notify_value_change(e.id.as_deref(), &e.value),
            Event::ProgramRecordCreation => strategy.notify_program_record_creation(),
            Event::ClearTemporaryData => strategy.clear_temporary_data(),
        }
    }

    /// Resets all fields, including nested thread information, so the
    /// event can go back to its pool.
    pub fn clear(&mut self) {
        *self = Event::for_tag(self.tag());
    }
}

/// Writes the tag followed by the event body.
pub fn write_event<W: Write + ?Sized>(out: &mut W, event: &Event) -> Result<(), ProtocolError> {
    out.write_i32(event.tag().value())?;
    event.write(out)
}

/// Reads a tag and the event body following it.
pub fn read_event<R: Read + ?Sized>(input: &mut R) -> Result<Event, ProtocolError> {
    let tag = input.read_i32()?;
    let tag = EventTag::from_i32(tag).ok_or(ProtocolError::UnknownTag(tag))?;
    let mut event = Event::for_tag(tag);
    event.read(input)?;
    Ok(event)
}
