//! # Run one unit of work.
//!
//! ```text
//! [delay?] ─► take work ─► publish UnitStarting ─► work(ctx, handle, input)
//!                                                     │
//!                         Ok(out)  ─► store output ─► publish UnitFinished
//!                         Err(e)   ─► store error  ─► publish UnitFailed
//!                         panic    ─► mark done    ─► publish UnitFailed ─► return payload
//! ```
//!
//! ## Rules
//! - The work function runs **at most once** per unit.
//! - Cancellation is advisory: nothing here aborts or times out the work.
//! - Always publishes **exactly one** terminal event per started unit.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::time;

use crate::context::Context;
use crate::core::handle::TaskHandle;
use crate::core::unit::{PanicPayload, UnitCell, UnitStatus};
use crate::events::{Bus, Event, EventKind};
use crate::subscribers::panic_message;

/// Executes `cell` once, storing its result on the cell.
///
/// Returns the panic payload if the work function panicked, so the caller can re-raise it.
pub(crate) async fn run_unit<I, O>(
    cell: Arc<UnitCell<I, O>>,
    ctx: Context,
    delay: Option<Duration>,
    bus: Bus,
) -> Result<(), PanicPayload>
where
    I: Clone + Send + 'static,
    O: Send + 'static,
{
    if let Some(d) = delay {
        cell.set_status(UnitStatus::Delayed);
        time::sleep(d).await;
    }

    let Some(work) = cell.take_work() else {
        return Ok(());
    };
    let input = cell.input();
    cell.set_status(UnitStatus::Running);
    publish_starting(&bus, &cell.id, delay);

    let handle = TaskHandle::from_cell(Arc::clone(&cell));
    let res = AssertUnwindSafe(async move { work(ctx, handle, input).await })
        .catch_unwind()
        .await;

    match res {
        Ok(Ok(output)) => {
            cell.finish(Some(output), None);
            bus.publish(Event::new(EventKind::UnitFinished).with_task(cell.id.as_ref()));
            Ok(())
        }
        Ok(Err(e)) => {
            publish_failed(&bus, &cell.id, e.to_string());
            cell.finish(None, Some(e));
            Ok(())
        }
        Err(payload) => {
            publish_failed(&bus, &cell.id, format!("panic: {}", panic_message(&*payload)));
            cell.finish(None, None);
            Err(payload)
        }
    }
}

fn publish_starting(bus: &Bus, id: &str, delay: Option<Duration>) {
    let mut ev = Event::new(EventKind::UnitStarting).with_task(id);
    if let Some(d) = delay {
        ev = ev.with_delay(d);
    }
    bus.publish(ev);
}

fn publish_failed(bus: &Bus, id: &str, reason: String) {
    bus.publish(
        Event::new(EventKind::UnitFailed)
            .with_task(id)
            .with_reason(reason),
    );
}
