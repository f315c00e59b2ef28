use crate::refcount::{Refcounter, Underflow};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub trait Handler<T>: Send + Sync {
    fn execute(&self, data: &T);
}

/// A handler, tagged with the form of payload it consumes.
pub enum Registration<P, C> {
    /// Consumes the payload as dispatched.
    Plain(Arc<dyn Handler<P>>),
    /// Consumes the payload after conversion to `C`.
    Converted(Arc<dyn Handler<C>>),
}

impl<P, C> Registration<P, C> {
    pub fn plain(handler: impl Handler<P> + 'static) -> Self {
        Self::Plain(Arc::new(handler))
    }

    pub fn converted(handler: impl Handler<C> + 'static) -> Self {
        Self::Converted(Arc::new(handler))
    }

    pub fn is_converted(&self) -> bool {
        matches!(self, Self::Converted(_))
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DispatchReport {
    /// Whether the payload was converted for this batch.
    pub converted: bool,
    /// Number of handlers executed.
    pub executed: usize,
}

/// Fans a payload out to a set of handlers, converting it first only while some handler needs it.
///
/// Conversion is switched on and off by the acquire/release hooks of a [`Refcounter`]
/// that counts the registered [`Registration::Converted`] handlers.
pub struct Dispatcher<P, C> {
    convert: Arc<AtomicBool>,
    converted_users: Refcounter,
    handlers: Vec<(HandlerId, Registration<P, C>)>,
    next_id: u64,
}

impl<P, C> Default for Dispatcher<P, C>
where
    C: for<'a> From<&'a P>,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<P, C> Dispatcher<P, C>
where
    C: for<'a> From<&'a P>,
{
    pub fn new() -> Self {
        let convert = Arc::new(AtomicBool::new(false));
        let converted_users = Refcounter::new(0)
            .on_acquire({
                let convert = convert.clone();
                move || {
                    log::info!("Enabling payload conversion");
                    convert.store(true, Ordering::SeqCst);
                }
            })
            .on_release({
                let convert = convert.clone();
                move || {
                    log::info!("Disabling payload conversion");
                    convert.store(false, Ordering::SeqCst);
                }
            });

        Self {
            convert,
            converted_users,
            handlers: Vec::new(),
            next_id: 0,
        }
    }

    pub fn with_handlers(handlers: impl IntoIterator<Item = Registration<P, C>>) -> Self {
        let mut dispatcher = Self::new();
        for handler in handlers {
            dispatcher.add(handler);
        }
        dispatcher
    }

    pub fn add(&mut self, registration: Registration<P, C>) -> HandlerId {
        let id = HandlerId(self.next_id);
        self.next_id += 1;

        if registration.is_converted() {
            self.converted_users.increment();
        }

        log::debug!(
            "Added handler {id:?} (converted={})",
            registration.is_converted()
        );
        self.handlers.push((id, registration));
        id
    }

    /// Remove a handler. Returns `Ok(false)` if no handler has this id.
    pub fn remove(&mut self, id: HandlerId) -> Result<bool, Underflow> {
        let Some(index) = self.handlers.iter().position(|(i, _)| *i == id) else {
            log::warn!("Tried to remove unknown handler {id:?}");
            return Ok(false);
        };

        let (_, registration) = self.handlers.remove(index);
        if registration.is_converted() {
            self.converted_users.decrement()?;
        }

        log::debug!("Removed handler {id:?}");
        Ok(true)
    }

    /// Run every handler once, in registration order.
    pub fn dispatch(&self, payload: &P) -> DispatchReport {
        let converted = self.converts().then(|| C::from(payload));

        match converted {
            Some(_) => log::debug!("Converting payload for {} handlers", self.len()),
            None => log::debug!("Dispatching unconverted payload to {} handlers", self.len()),
        }

        let mut executed = 0;
        for (id, registration) in &self.handlers {
            match registration {
                Registration::Plain(handler) => handler.execute(payload),
                Registration::Converted(handler) => match &converted {
                    Some(converted) => handler.execute(converted),
                    None => {
                        log::error!("Skipping handler {id:?}: needs conversion, but it is off");
                        continue;
                    }
                },
            }
            log::debug!("Executed handler {id:?}");
            executed += 1;
        }

        DispatchReport {
            converted: converted.is_some(),
            executed,
        }
    }

    pub fn converts(&self) -> bool {
        self.convert.load(Ordering::SeqCst)
    }

    pub fn converted_users(&self) -> usize {
        self.converted_users.count()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
