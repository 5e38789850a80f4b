//! Complete IOPMP unit: configuration port, per-direction gates and the
//! downstream memory they guard.

use crate::{
    AccessKind, ConfigError, ConfigPort, Decision, FetchGate, GateDiagnostics, IopmpConfig,
    MemoryPort, PortDiagnostics, ReadGate, ReadResponse, RegionTable, RegisterError,
    RegisterInterface, RegisterWriteResult, ResponseCode, TraceEvent, TraceSink, WriteGate,
    WriteResponse,
};

/// One IOPMP instance in front of a downstream port `M`.
pub struct Iopmp<M: MemoryPort> {
    port: ConfigPort,
    read_gate: ReadGate,
    write_gate: WriteGate,
    fetch_gate: FetchGate,
    memory: M,
    trace: Option<Box<dyn TraceSink + Send>>,
}

impl<M: MemoryPort> Iopmp<M> {
    /// Builds a unit in the reset state.
    ///
    /// # Errors
    ///
    /// Returns the [`ConfigError`] reported by [`IopmpConfig::validate`].
    pub fn new(config: IopmpConfig, memory: M) -> Result<Self, ConfigError> {
        Ok(Self {
            port: ConfigPort::new(config)?,
            read_gate: ReadGate::new(),
            write_gate: WriteGate::new(),
            fetch_gate: FetchGate::new(),
            memory,
            trace: None,
        })
    }

    /// Installs a trace sink; events flow only while
    /// [`IopmpConfig::tracing_enabled`] is set.
    #[must_use]
    pub fn with_trace_sink(mut self, sink: Box<dyn TraceSink + Send>) -> Self {
        self.trace = Some(sink);
        self
    }

    /// Replaces the trace sink, returning the previous one.
    pub fn set_trace_sink(
        &mut self,
        sink: Option<Box<dyn TraceSink + Send>>,
    ) -> Option<Box<dyn TraceSink + Send>> {
        core::mem::replace(&mut self.trace, sink)
    }

    /// Static hardware parameters.
    #[must_use]
    pub const fn config(&self) -> &IopmpConfig {
        self.port.config()
    }

    /// Configuration port.
    #[must_use]
    pub const fn port(&self) -> &ConfigPort {
        &self.port
    }

    /// Current region table.
    #[must_use]
    pub fn table(&self) -> &RegionTable {
        self.port.table()
    }

    /// Downstream port.
    #[must_use]
    pub const fn memory(&self) -> &M {
        &self.memory
    }

    /// Downstream port, for backdoor access that bypasses the gates.
    #[allow(clippy::missing_const_for_fn)]
    pub fn memory_mut(&mut self) -> &mut M {
        &mut self.memory
    }

    /// Read-gate counters.
    #[must_use]
    pub const fn read_diagnostics(&self) -> &GateDiagnostics {
        self.read_gate.diagnostics()
    }

    /// Write-gate counters.
    #[must_use]
    pub const fn write_diagnostics(&self) -> &GateDiagnostics {
        self.write_gate.diagnostics()
    }

    /// Fetch-gate counters.
    #[must_use]
    pub const fn fetch_diagnostics(&self) -> &GateDiagnostics {
        self.fetch_gate.diagnostics()
    }

    /// Configuration-port counters.
    #[must_use]
    pub const fn port_diagnostics(&self) -> &PortDiagnostics {
        self.port.diagnostics()
    }

    /// Data read through the read gate.
    pub fn read(&mut self, address: u64, length: usize) -> ReadResponse {
        let response = self
            .read_gate
            .read(self.port.table(), &mut self.memory, address, length);
        self.trace_response(AccessKind::Read, address, length, response.code, response.decision);
        response
    }

    /// Instruction fetch through the fetch gate.
    pub fn fetch(&mut self, address: u64, length: usize) -> ReadResponse {
        let response = self
            .fetch_gate
            .fetch(self.port.table(), &mut self.memory, address, length);
        self.trace_response(AccessKind::Execute, address, length, response.code, response.decision);
        response
    }

    /// Data write through the write gate.
    pub fn write(&mut self, address: u64, data: &[u8]) -> WriteResponse {
        let response = self
            .write_gate
            .write(self.port.table(), &mut self.memory, address, data);
        self.trace_response(
            AccessKind::Write,
            address,
            data.len(),
            response.code,
            response.decision,
        );
        response
    }

    /// Reads configuration registers.
    ///
    /// # Errors
    ///
    /// See [`ConfigPort::read`].
    pub fn config_read(&self, offset: u64, buf: &mut [u8]) -> Result<(), RegisterError> {
        self.port.read(offset, buf)
    }

    /// Writes configuration registers.
    ///
    /// # Errors
    ///
    /// See [`ConfigPort::write`].
    pub fn config_write(
        &mut self,
        offset: u64,
        data: &[u8],
    ) -> Result<RegisterWriteResult, RegisterError> {
        let result = self.port.write(offset, data)?;
        self.emit(TraceEvent::RegisterWrite {
            offset,
            width: data.len(),
            result,
        });
        Ok(result)
    }

    /// Hardware reset of the region table, locks and counters.
    ///
    /// Downstream memory keeps its contents.
    pub fn reset(&mut self) {
        self.port.reset();
        self.read_gate.reset_diagnostics();
        self.write_gate.reset_diagnostics();
        self.fetch_gate.reset_diagnostics();
        self.emit(TraceEvent::Reset);
    }

    /// Consumes the unit and returns the downstream port.
    pub fn into_memory(self) -> M {
        self.memory
    }

    fn trace_response(
        &mut self,
        kind: AccessKind,
        address: u64,
        length: usize,
        code: ResponseCode,
        decision: Decision,
    ) {
        self.emit(TraceEvent::Decision {
            kind,
            address,
            length: length as u64,
            decision,
        });
        if decision.is_allowed() && !code.is_okay() {
            self.emit(TraceEvent::DownstreamError { kind, address });
        }
    }

    fn emit(&mut self, event: TraceEvent) {
        if !self.port.config().tracing_enabled {
            return;
        }
        if let Some(sink) = self.trace.as_mut() {
            sink.on_event(event);
        }
    }
}

impl<M: MemoryPort> RegisterInterface for Iopmp<M> {
    fn iopmp_config(&self) -> &IopmpConfig {
        self.config()
    }

    fn read_register(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), RegisterError> {
        self.config_read(offset, buf)
    }

    fn write_register(
        &mut self,
        offset: u64,
        data: &[u8],
    ) -> Result<RegisterWriteResult, RegisterError> {
        self.config_write(offset, data)
    }
}
