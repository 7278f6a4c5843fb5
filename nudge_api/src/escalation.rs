use crate::finding::Finding;
use std::any::Any;
use std::fmt;
use std::mem;
use std::panic;
use std::thread;

/// Category tag carried by every [`Escalation`].
///
/// The facade and the engine recognise an escalated finding by this tag on
/// the shared envelope, never by the name of whichever type raised it.
pub const FINDING_CATEGORY: &str = "nudge.finding";

/// Panic payload that carries a hook finding up to the engine's dispatcher.
///
/// An escalation is hard to catch: if a broad `catch_unwind` swallows it and
/// drops the payload, the drop raises a fresh escalation with the same
/// finding. Only the engine ends the chain, by calling [`Escalation::defuse`]
/// or [`Escalation::defuse_payload`].
pub struct Escalation {
    category: &'static str,
    finding: Finding,
    armed: bool,
}

impl Escalation {
    /// Creates an armed escalation carrying `finding`.
    pub fn new(finding: Finding) -> Self {
        Self {
            category: FINDING_CATEGORY,
            finding,
            armed: true,
        }
    }

    /// Unwinds with a new escalation carrying `finding`.
    ///
    /// Uses `resume_unwind`, so the panic hook does not run and nothing is
    /// printed on the way up.
    pub fn raise(finding: Finding) -> ! {
        panic::resume_unwind(Box::new(Escalation::new(finding)))
    }

    pub fn category(&self) -> &'static str {
        self.category
    }

    pub fn finding(&self) -> &Finding {
        &self.finding
    }

    /// Returns the escalation inside `payload` if it carries the finding category.
    pub fn recognize(payload: &(dyn Any + Send)) -> Option<&Escalation> {
        payload
            .downcast_ref::<Escalation>()
            .filter(|escalation| escalation.category == FINDING_CATEGORY)
    }

    /// Disarms the escalation and hands out its finding.
    pub fn defuse(mut self) -> Finding {
        self.take_finding()
    }

    /// Defuses `payload` if it is an escalation, otherwise gives it back untouched.
    pub fn defuse_payload(payload: Box<dyn Any + Send>) -> Result<Finding, Box<dyn Any + Send>> {
        if Escalation::recognize(payload.as_ref()).is_none() {
            return Err(payload);
        }
        payload
            .downcast::<Escalation>()
            .map(|escalation| escalation.defuse())
    }

    fn take_finding(&mut self) -> Finding {
        self.armed = false;
        mem::replace(&mut self.finding, Finding::new(String::new()))
    }
}

impl fmt::Debug for Escalation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Escalation")
            .field("category", &self.category)
            .field("finding", &self.finding)
            .field("armed", &self.armed)
            .finish()
    }
}

impl Drop for Escalation {
    fn drop(&mut self) {
        // Dropping during an unwind would abort; the engine's last-finding
        // record covers that case.
        if self.armed && !thread::panicking() {
            let finding = self.take_finding();
            log::debug!("escalated finding was swallowed by a broad catch, raising it again");
            Escalation::raise(finding);
        }
    }
}

/// Renders a caught panic payload as text, consuming it.
///
/// Escalations are defused first so that describing one never re-raises it.
pub fn describe_payload(payload: Box<dyn Any + Send>) -> String {
    let payload = match Escalation::defuse_payload(payload) {
        Ok(finding) => return format!("escalated finding: {finding}"),
        Err(payload) => payload,
    };
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic type".to_string()
    }
}
