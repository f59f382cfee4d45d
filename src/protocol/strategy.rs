//! Values carried by recording events and the strategy they are
//! dispatched to.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use super::wire::{DataInput, DataOutput};
use super::ProtocolError;
use crate::semantics::{StreamType, TimerState};

/// CPU ticks of the thread that produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ThreadsInfo {
    pub current_thread_ticks: i64,
    pub current_thread_id: i64,
}

impl ThreadsInfo {
    pub fn new(thread_id: i64, thread_ticks: i64) -> Self {
        ThreadsInfo { current_thread_ticks: thread_ticks, current_thread_id: thread_id }
    }

    pub fn write<W: Write + ?Sized>(&self, out: &mut W) -> Result<(), ProtocolError> {
        out.write_i64(self.current_thread_ticks)?;
        out.write_i64(self.current_thread_id)
    }

    pub fn read<R: Read + ?Sized>(&mut self, input: &mut R) -> Result<(), ProtocolError> {
        self.current_thread_ticks = input.read_i64()?;
        self.current_thread_id = input.read_i64()?;
        Ok(())
    }

    pub fn clear(&mut self) {
        *self = ThreadsInfo::default();
    }
}

/// Load, memory and I/O figures of either the system or the JVM.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Measurements {
    pub avg_load: f64,
    pub load: f64,
    pub min_load: f64,
    pub max_load: f64,
    pub avg_mem_use: f64,
    pub mem_use: f64,
    pub min_mem_use: i64,
    pub max_mem_use: i64,
    pub system_time: i64,
    pub io_read: i64,
    pub io_write: i64,
    pub status: i32,
}

impl Measurements {
    pub fn write<W: Write + ?Sized>(&self, out: &mut W) -> Result<(), ProtocolError> {
        out.write_f64(self.avg_load)?;
        out.write_f64(self.load)?;
        out.write_f64(self.min_load)?;
        out.write_f64(self.max_load)?;
        out.write_f64(self.avg_mem_use)?;
        out.write_f64(self.mem_use)?;
        out.write_i64(self.min_mem_use)?;
        out.write_i64(self.max_mem_use)?;
        out.write_i64(self.system_time)?;
        out.write_i64(self.io_read)?;
        out.write_i64(self.io_write)?;
        out.write_i32(self.status)
    }

    pub fn read<R: Read + ?Sized>(&mut self, input: &mut R) -> Result<(), ProtocolError> {
        self.avg_load = input.read_f64()?;
        self.load = input.read_f64()?;
        self.min_load = input.read_f64()?;
        self.max_load = input.read_f64()?;
        self.avg_mem_use = input.read_f64()?;
        self.mem_use = input.read_f64()?;
        self.min_mem_use = input.read_i64()?;
        self.max_mem_use = input.read_i64()?;
        self.system_time = input.read_i64()?;
        self.io_read = input.read_i64()?;
        self.io_write = input.read_i64()?;
        self.status = input.read_i32()?;
        Ok(())
    }
}

/// System measurements followed by JVM measurements.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ProcessData {
    pub system: Measurements,
    pub jvm: Measurements,
}

impl ProcessData {
    pub fn write<W: Write + ?Sized>(&self, out: &mut W) -> Result<(), ProtocolError> {
        self.system.write(out)?;
        self.jvm.write(out)
    }

    pub fn read<R: Read + ?Sized>(&mut self, input: &mut R) -> Result<(), ProtocolError> {
        self.system.read(input)?;
        self.jvm.read(input)
    }
}

/// Type of a notified value. The ordinal is written on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Double,
    Float,
    Int,
    Long,
    Char,
    Boolean,
    Short,
    Byte,
    String,
    Object,
}

impl ValueType {
    const ALL: [ValueType; 10] = [
        ValueType::Double,
        ValueType::Float,
        ValueType::Int,
        ValueType::Long,
        ValueType::Char,
        ValueType::Boolean,
        ValueType::Short,
        ValueType::Byte,
        ValueType::String,
        ValueType::Object,
    ];

    pub fn ordinal(self) -> i32 {
        self as i32
    }

    pub fn from_ordinal(ordinal: i32) -> Option<Self> {
        usize::try_from(ordinal).ok().and_then(|i| Self::ALL.get(i).copied())
    }
}

/// A notified value. Objects travel as their string form.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Double(f64),
    Float(f32),
    Int(i32),
    Long(i64),
    Char(u16),
    Boolean(bool),
    Short(i16),
    Byte(i8),
    String(Option<String>),
    Object(Option<String>),
}

impl Default for Value {
    fn default() -> Self {
        Value::Object(None)
    }
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Double(_) => ValueType::Double,
            Value::Float(_) => ValueType::Float,
            Value::Int(_) => ValueType::Int,
            Value::Long(_) => ValueType::Long,
            Value::Char(_) => ValueType::Char,
            Value::Boolean(_) => ValueType::Boolean,
            Value::Short(_) => ValueType::Short,
            Value::Byte(_) => ValueType::Byte,
            Value::String(_) => ValueType::String,
            Value::Object(_) => ValueType::Object,
        }
    }

    /// Writes the payload only; the type ordinal precedes it on the wire.
    pub fn write<W: Write + ?Sized>(&self, out: &mut W) -> Result<(), ProtocolError> {
        match self {
            Value::Double(v) => out.write_f64(*v),
            Value::Float(v) => out.write_f32(*v),
            Value::Int(v) => out.write_i32(*v),
            Value::Long(v) => out.write_i64(*v),
            Value::Char(v) => out.write_char(*v),
            Value::Boolean(v) => out.write_bool(*v),
            Value::Short(v) => out.write_i16(*v),
            Value::Byte(v) => out.write_i8(*v),
            Value::String(v) | Value::Object(v) => out.write_string(v.as_deref()),
        }
    }

    pub fn read<R: Read + ?Sized>(value_type: ValueType, input: &mut R) -> Result<Self, ProtocolError> {
        Ok(match value_type {
            ValueType::Double => Value::Double(input.read_f64()?),
            ValueType::Float => Value::Float(input.read_f32()?),
            ValueType::Int => Value::Int(input.read_i32()?),
            ValueType::Long => Value::Long(input.read_i64()?),
            ValueType::Char => Value::Char(input.read_char()?),
            ValueType::Boolean => Value::Boolean(input.read_bool()?),
            ValueType::Short => Value::Short(input.read_i16()?),
            ValueType::Byte => Value::Byte(input.read_i8()?),
            ValueType::String => Value::String(input.read_string()?),
            ValueType::Object => Value::Object(input.read_string()?),
        })
    }
}

/// CPU time per thread id, as sent with `FinishRecording`.
pub type CpuTimes = BTreeMap<i64, i64>;

pub(crate) fn write_cpu_times<W: Write + ?Sized>(out: &mut W, times: &CpuTimes) -> Result<(), ProtocolError> {
    let len = i32::try_from(times.len()).map_err(|_| ProtocolError::TooManyEntries(times.len()))?;
    out.write_i32(len)?;
    for (thread, ticks) in times {
        out.write_i64(*thread)?;
        out.write_i64(*ticks)?;
    }
    Ok(())
}

pub(crate) fn read_cpu_times<R: Read + ?Sized>(input: &mut R, times: &mut CpuTimes) -> Result<(), ProtocolError> {
    let len = input.read_i32()?;
    for _ in 0..len.max(0) {
        let thread = input.read_i64()?;
        let ticks = input.read_i64()?;
        times.insert(thread, ticks);
    }
    Ok(())
}

/// Receiver of dispatched events.
///
/// Each event calls exactly one method. All methods default to no-ops, so
/// a strategy only implements what it records.
#[allow(unused_variables)]
pub trait RecorderStrategy {
    fn enter_configuration(&mut self, id: Option<&str>) {}

    fn enter(&mut self, rec_id: Option<&str>, now: i64, threads_info: &ThreadsInfo, exclude: bool) {}

    fn exit(&mut self, rec_id: Option<&str>, now: i64, threads_info: &ThreadsInfo, exclude: bool) {}

    fn finish_recording(&mut self, now: i64, thread_id: i64, cpu_times: &CpuTimes) {}

    fn memory_allocated(&mut self, rec_id: Option<&str>, thread_id: i64, id: i64, size: i64) {}

    fn memory_freed_by_rec_id(&mut self, rec_id: Option<&str>, size: i64) {}

    fn print_statistics(&mut self, data: &ProcessData) {}

    fn read_io(&mut self, rec_id: Option<&str>, caller: Option<&str>, thread_id: i64, bytes: i32, stream: StreamType) {}

    fn write_io(&mut self, rec_id: Option<&str>, caller: Option<&str>, thread_id: i64, bytes: i32, stream: StreamType) {}

    fn start_recording(&mut self, now: i64, thread_id: i64, thread_ticks: i64) {}

    fn stop_time_recording(&mut self, now: i64, threads_info: &ThreadsInfo) {}

    fn end_system(&mut self) {}

    fn register(&mut self, thread_id: i64, new_id: i64, thread_ticks: i64, now: i64) {}

    fn assign_all_to(&mut self, rec_id: Option<&str>, enter: bool, now: i64, threads_info: &ThreadsInfo) {}

    fn print_current_state(&mut self, data: &ProcessData) {}

    fn notify_timer(&mut self, id: Option<&str>, state: TimerState, now: i64, thread_id: i64) {}

    fn notify_value_change(&mut self, id: Option<&str>, value: &Value) {}

    fn notify_program_record_creation(&mut self) {}

    fn clear_temporary_data(&mut self) {}
}
