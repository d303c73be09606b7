/*!
 * Control Plane
 * Maps out-of-band requests on a client handle onto core operations
 */

use super::manager::EventCore;
use super::types::{ControlRequest, ControlResponse};
use crate::core::errors::{EventError, EventResult};
use crate::core::types::{ClientId, ModuleId};
use tracing::{debug, warn};

impl EventCore {
    /// Execute one control request on behalf of a client handle
    ///
    /// Every request returns an explicit status; nothing is swallowed.
    pub fn control(&self, id: ClientId, request: ControlRequest) -> EventResult<ControlResponse> {
        let span = crate::monitoring::span_control(request.name(), id);
        let _entered = span.enter();

        let result = self.execute(id, request);
        match &result {
            Ok(response) => debug!(?response, "control request done"),
            Err(err) if err.is_recoverable() => debug!(error = %err, "control request failed"),
            Err(err) => warn!(error = %err, "control request failed"),
        }
        result
    }

    fn execute(&self, id: ClientId, request: ControlRequest) -> EventResult<ControlResponse> {
        let client = self.client(id)?;
        client.ensure_active()?;
        let module_of = |module: Option<ModuleId>| {
            module
                .or_else(|| client.selected_module())
                .ok_or(EventError::NoModuleSelected(id))
        };

        let response = match request {
            ControlRequest::SelectModule { module } => {
                self.installed(module)?;
                client.select_module(module);
                ControlResponse::Done
            }
            ControlRequest::Connect {
                module,
                source,
                mode,
            } => {
                self.connect(id, module, source, mode)?;
                ControlResponse::Done
            }
            ControlRequest::Disconnect { module, source } => {
                self.disconnect(id, module, source)?;
                ControlResponse::Done
            }
            ControlRequest::DisconnectAll => {
                self.disconnect_all(id)?;
                ControlResponse::Done
            }
            ControlRequest::SetTimeout { deciseconds } => {
                client.set_timeout_ds(deciseconds);
                ControlResponse::Done
            }
            ControlRequest::GetTimeout => ControlResponse::Timeout(client.timeout_ds()),
            ControlRequest::SetQueueFlag { off } => {
                client.set_queue_off(off);
                ControlResponse::Done
            }
            ControlRequest::GetQueueFlag => ControlResponse::QueueOff(client.queue_off()),
            ControlRequest::GetQueueDepth => ControlResponse::QueueDepth(client.queue_depth()),
            ControlRequest::GetMissedCount => ControlResponse::Missed(client.take_missed()),
            ControlRequest::ResetModule { module } => {
                ControlResponse::Reset(self.reset_module(module_of(module)?)?)
            }
            ControlRequest::GetStatus { module } => {
                ControlResponse::Status(self.module(module_of(module)?)?.report())
            }
            ControlRequest::EnableInterrupts { module, mask } => {
                let module = self.module(module_of(module)?)?;
                ControlResponse::EnabledMask(module.enable_interrupts(mask))
            }
            ControlRequest::DisableInterrupts { module, mask } => {
                let module = self.module(module_of(module)?)?;
                ControlResponse::EnabledMask(module.disable_interrupts(mask))
            }
            ControlRequest::ListConnections { pid } => {
                ControlResponse::Connections(self.list_connections(pid))
            }
            ControlRequest::Simulate {
                module,
                source,
                payload,
            } => ControlResponse::Dispatched(self.simulate(module_of(module)?, source, payload)?),
        };
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::CoreConfig;
    use crate::core::sync::Timeout;
    use crate::driver::ModuleSpec;
    use crate::events::SubscriptionMode;
    use crate::module::ModuleStatus;
    use pretty_assertions::assert_eq;

    fn setup() -> (EventCore, ModuleId, ClientId) {
        let core = EventCore::new(CoreConfig::minimal()).unwrap();
        let m = core.install_module(ModuleSpec::new("ctr", 8)).unwrap();
        let c = core.open(7, Some(m)).unwrap();
        (core, m, c)
    }

    #[test]
    fn test_timeout_roundtrip() {
        let (core, _m, c) = setup();
        assert_eq!(
            core.control(c, ControlRequest::GetTimeout),
            Ok(ControlResponse::Timeout(10))
        );
        core.control(c, ControlRequest::SetTimeout { deciseconds: 0 })
            .unwrap();
        assert_eq!(
            core.control(c, ControlRequest::GetTimeout),
            Ok(ControlResponse::Timeout(0))
        );
        assert_eq!(core.client(c).unwrap().timeout(), Timeout::Infinite);
    }

    #[test]
    fn test_missed_count_read_and_clear() {
        let (core, m, c) = setup();
        core.control(
            c,
            ControlRequest::Connect {
                module: None,
                source: 0,
                mode: SubscriptionMode::Queued,
            },
        )
        .unwrap();
        let capacity = core.config().queue_capacity as u64;
        for t in 0..=capacity {
            core.dispatch(m, 1, crate::core::types::EventTime::from_seconds(t), None)
                .unwrap();
        }

        assert_eq!(
            core.control(c, ControlRequest::GetQueueDepth),
            Ok(ControlResponse::QueueDepth(capacity as usize))
        );
        assert_eq!(
            core.control(c, ControlRequest::GetMissedCount),
            Ok(ControlResponse::Missed(1))
        );
        assert_eq!(
            core.control(c, ControlRequest::GetMissedCount),
            Ok(ControlResponse::Missed(0))
        );
    }

    #[test]
    fn test_queue_flag() {
        let (core, _m, c) = setup();
        core.control(c, ControlRequest::SetQueueFlag { off: true })
            .unwrap();
        assert_eq!(
            core.control(c, ControlRequest::GetQueueFlag),
            Ok(ControlResponse::QueueOff(true))
        );
    }

    #[test]
    fn test_status_and_interrupt_mask() {
        let (core, m, c) = setup();
        assert_eq!(
            core.control(
                c,
                ControlRequest::EnableInterrupts {
                    module: None,
                    mask: 0b1010
                }
            ),
            Ok(ControlResponse::EnabledMask(0b1010))
        );
        assert_eq!(
            core.control(
                c,
                ControlRequest::DisableInterrupts {
                    module: Some(m),
                    mask: 0b0010
                }
            ),
            Ok(ControlResponse::EnabledMask(0b1000))
        );

        let Ok(ControlResponse::Status(report)) =
            core.control(c, ControlRequest::GetStatus { module: None })
        else {
            panic!("expected a status report");
        };
        assert_eq!(report.enabled_mask, 0b1000);
        assert_eq!(report.status, ModuleStatus::empty());
        assert_eq!(report.name, "ctr");
    }

    #[test]
    fn test_select_unknown_module() {
        let (core, _m, c) = setup();
        assert_eq!(
            core.control(
                c,
                ControlRequest::SelectModule {
                    module: ModuleId::new(1, 1)
                }
            ),
            Err(EventError::NoSuchModule(ModuleId::new(1, 1)))
        );
    }

    #[test]
    fn test_reset_through_control() {
        let (core, m, c) = setup();
        core.connect(c, Some(m), 2, SubscriptionMode::Queued).unwrap();
        assert_eq!(
            core.control(c, ControlRequest::ResetModule { module: None }),
            Ok(ControlResponse::Reset(1))
        );
        assert_eq!(core.read(c, Some(Timeout::Immediate)), Err(EventError::Reset));
    }

    #[test]
    fn test_closed_handle_rejected() {
        let (core, _m, c) = setup();
        core.close(c).unwrap();
        assert_eq!(
            core.control(c, ControlRequest::GetTimeout),
            Err(EventError::InvalidHandle(c))
        );
    }

    #[test]
    fn test_request_from_json() {
        let (core, m, c) = setup();
        let request: ControlRequest =
            serde_json::from_str(r#"{"request":"simulate","source":5,"payload":3}"#).unwrap();
        core.connect(c, Some(m), 5, SubscriptionMode::Queued).unwrap();

        let response = core.control(c, request).unwrap();
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["response"], "dispatched");
        assert_eq!(json["value"]["delivered"], 1);
    }
}
