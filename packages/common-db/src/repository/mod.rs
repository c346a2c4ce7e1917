//! Repositórios SQLite
//!
//! Cada store encapsula o pool e expõe apenas as consultas de que o núcleo
//! precisa. IDs gerados são lidos com `RETURNING`.

mod alerts;
mod appointments;
mod audit;
mod occurrences;
mod patients;
mod sessions;

pub use alerts::AlertStore;
pub use appointments::AppointmentStore;
pub use audit::AuditStore;
pub use occurrences::OccurrenceStore;
pub use patients::PatientStore;
pub use sessions::SessionStore;

use crate::models::MAX_PAGE_LIMIT;

/// Normaliza limite/deslocamento de paginação
pub(crate) fn clamp_page(limit: i64, offset: i64) -> (i64, i64) {
    (limit.clamp(1, MAX_PAGE_LIMIT), offset.max(0))
}
