use std::sync::Arc;

/// Domain-level logging port (Hexagonal port).
/// Components receive a logger at construction; nothing reaches for a global.
/// Keep this API small and non-fallible from the domain perspective.
pub trait DomainLogger: Send + Sync + 'static {
    fn debug(&self, _msg: &str) {}
    fn info(&self, msg: &str);
    fn warn(&self, msg: &str);
    fn error(&self, msg: &str);
}

pub type DynLogger = Arc<dyn DomainLogger>;
