//! Modelos de dados compartilhados entre aplicações
//!
//! Este módulo define as estruturas de dados principais usadas pelo núcleo de
//! cuidado da clínica: pacientes, agendamentos, ocorrências, alertas, sessões
//! de paciente e trilha de auditoria.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

use crate::error::DbError;

/// Gera um enum fechado com `as_str`, `Display` e `FromStr`
macro_rules! str_enum {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident => $s:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = DbError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DbError::InvalidEnum {
                        field: stringify!($name),
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

str_enum!(
    /// Status possíveis de um agendamento
    AppointmentStatus {
        /// Agendamento inicial, pendente de confirmação
        Scheduled => "scheduled",
        /// Confirmado pelo paciente ou pela equipe
        Confirmed => "confirmed",
        /// Consulta concluída
        Completed => "completed",
        /// Paciente não compareceu (ou recusou antecipadamente)
        NoShow => "no_show",
        /// Cancelado pelo profissional
        Canceled => "canceled",
    }
);

str_enum!(
    /// Tipo de atendimento
    AppointmentType {
        Triage => "triage",
        Treatment => "treatment",
        Return => "return",
    }
);

str_enum!(
    /// Origem de uma ocorrência clínica
    OccurrenceSource {
        /// Relatada pelo próprio paciente (app)
        Patient => "patient",
        /// Registrada pelo profissional
        Professional => "professional",
    }
);

str_enum!(
    /// Gravidade de um alerta
    AlertSeverity {
        Low => "low",
        Medium => "medium",
        High => "high",
    }
);

str_enum!(
    /// Situação de um alerta
    AlertStatus {
        Open => "open",
        Acknowledged => "acknowledged",
        Closed => "closed",
    }
);

/// Lê uma coluna texto e converte para um dos enums fechados
fn decode_enum<T>(row: &SqliteRow, column: &str) -> sqlx::Result<T>
where
    T: std::str::FromStr<Err = DbError>,
{
    let raw: String = row.try_get(column)?;
    raw.parse::<T>().map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            e.to_string(),
        )),
    })
}

/// Paginação padrão das listagens
pub const DEFAULT_PAGE_LIMIT: i64 = 50;
/// Limite máximo de registros por página
pub const MAX_PAGE_LIMIT: i64 = 100;

fn default_limit() -> i64 {
    DEFAULT_PAGE_LIMIT
}

/// Página de resultados com total para paginação
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: i64,
}

// ---------------------------------------------------------------------------
// Pacientes
// ---------------------------------------------------------------------------

/// Paciente com o estado de autenticação por PIN
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    /// Identificador interno
    pub id: i64,
    /// CPF (somente dígitos, único)
    pub cpf: String,
    /// Nome completo
    pub name: String,
    /// Hash argon2id do PIN (formato PHC); nunca exposto
    #[serde(skip_serializing, default)]
    pub pin_hash: Option<String>,
    /// Tentativas consecutivas de PIN com falha
    pub pin_attempts: i64,
    /// Bloqueio de PIN ativo até este instante
    pub pin_blocked_until: Option<DateTime<Utc>>,
    /// Profissional responsável pelo acompanhamento
    pub professional_id: Option<i64>,
    /// Data e hora de criação do registro
    pub created_at: DateTime<Utc>,
}

impl Patient {
    /// Bloqueio derivado do timestamp, sem estado persistido
    pub fn is_pin_blocked(&self, now: DateTime<Utc>) -> bool {
        self.pin_blocked_until.map_or(false, |until| until > now)
    }
}

impl FromRow<'_, SqliteRow> for Patient {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            cpf: row.try_get("cpf")?,
            name: row.try_get("name")?,
            pin_hash: row.try_get("pin_hash")?,
            pin_attempts: row.try_get("pin_attempts")?,
            pin_blocked_until: row.try_get("pin_blocked_until")?,
            professional_id: row.try_get("professional_id")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Dados de cadastro de um paciente (onboarding pela equipe)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePatient {
    pub cpf: String,
    pub name: String,
    pub pin_hash: Option<String>,
    pub professional_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Agendamentos
// ---------------------------------------------------------------------------

/// Representa uma consulta/agendamento
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    /// Identificador único da consulta
    pub id: i64,
    /// Identificador do paciente
    pub patient_id: i64,
    /// Profissional responsável
    pub professional_id: i64,
    /// Data e hora agendada (precisão de segundos)
    pub starts_at: DateTime<Utc>,
    /// Tipo de consulta
    #[serde(rename = "type")]
    pub appointment_type: AppointmentType,
    /// Status atual da consulta
    pub status: AppointmentStatus,
    /// Observações livres
    pub notes: Option<String>,
    /// Data e hora de criação do registro
    pub created_at: DateTime<Utc>,
    /// Data e hora da última alteração
    pub updated_at: DateTime<Utc>,
}

impl FromRow<'_, SqliteRow> for Appointment {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            patient_id: row.try_get("patient_id")?,
            professional_id: row.try_get("professional_id")?,
            starts_at: row.try_get("starts_at")?,
            appointment_type: decode_enum(row, "type")?,
            status: decode_enum(row, "status")?,
            notes: row.try_get("notes")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Registro a ser inserido pelo repositório de agendamentos
#[derive(Debug, Clone)]
pub struct CreateAppointment {
    pub patient_id: i64,
    pub professional_id: i64,
    pub starts_at: DateTime<Utc>,
    pub appointment_type: AppointmentType,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Alteração parcial de um agendamento
///
/// `notes: Some(None)` limpa as observações; `None` mantém o valor atual.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppointmentPatch {
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default, rename = "type")]
    pub appointment_type: Option<AppointmentType>,
    #[serde(default, with = "double_option")]
    pub notes: Option<Option<String>>,
}

impl AppointmentPatch {
    pub fn is_empty(&self) -> bool {
        self.starts_at.is_none() && self.appointment_type.is_none() && self.notes.is_none()
    }

    /// Nomes dos campos presentes, na ordem usada na auditoria
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.starts_at.is_some() {
            fields.push("startsAt");
        }
        if self.appointment_type.is_some() {
            fields.push("type");
        }
        if self.notes.is_some() {
            fields.push("notes");
        }
        fields
    }
}

/// Filtros de listagem de agendamentos
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentFilters {
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub patient_id: Option<i64>,
    #[serde(default)]
    pub professional_id: Option<i64>,
    #[serde(default)]
    pub status: Option<AppointmentStatus>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

impl Default for AppointmentFilters {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            patient_id: None,
            professional_id: None,
            status: None,
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
        }
    }
}

/// Consulta de conflito de horário: mesmo profissional, mesmo instante
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConflictQuery {
    pub professional_id: i64,
    pub starts_at: DateTime<Utc>,
    pub exclude_id: Option<i64>,
}

// ---------------------------------------------------------------------------
// Ocorrências
// ---------------------------------------------------------------------------

/// Ocorrência clínica (relato de sintoma); imutável após criada
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Occurrence {
    pub id: i64,
    pub patient_id: i64,
    /// Profissional dono do registro, mesmo quando relatada pelo paciente
    pub professional_id: i64,
    pub kind: String,
    /// Intensidade de 0 a 10
    pub intensity: i32,
    pub source: OccurrenceSource,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl FromRow<'_, SqliteRow> for Occurrence {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            patient_id: row.try_get("patient_id")?,
            professional_id: row.try_get("professional_id")?,
            kind: row.try_get("kind")?,
            intensity: row.try_get("intensity")?,
            source: decode_enum(row, "source")?,
            notes: row.try_get("notes")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Registro a ser inserido pelo repositório de ocorrências
#[derive(Debug, Clone)]
pub struct CreateOccurrence {
    pub patient_id: i64,
    pub professional_id: i64,
    pub kind: String,
    pub intensity: i32,
    pub source: OccurrenceSource,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Filtros de listagem de ocorrências de um paciente
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OccurrenceFilters {
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub kind: Option<String>,
}

// ---------------------------------------------------------------------------
// Alertas
// ---------------------------------------------------------------------------

/// Alerta gerado a partir de relatos do paciente
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: i64,
    pub patient_id: i64,
    pub kind: String,
    pub severity: AlertSeverity,
    pub status: AlertStatus,
    pub details: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Preenchido ao sair de `open`
    pub resolved_at: Option<DateTime<Utc>>,
    /// Profissional que reconheceu/fechou o alerta
    pub resolved_by: Option<i64>,
}

impl FromRow<'_, SqliteRow> for Alert {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            patient_id: row.try_get("patient_id")?,
            kind: row.try_get("kind")?,
            severity: decode_enum(row, "severity")?,
            status: decode_enum(row, "status")?,
            details: row.try_get("details")?,
            created_at: row.try_get("created_at")?,
            resolved_at: row.try_get("resolved_at")?,
            resolved_by: row.try_get("resolved_by")?,
        })
    }
}

/// Registro a ser inserido pelo repositório de alertas
#[derive(Debug, Clone)]
pub struct CreateAlert {
    pub patient_id: i64,
    pub kind: String,
    pub severity: AlertSeverity,
    pub status: AlertStatus,
    pub details: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Nova situação de um alerta com os campos de resolução já resolvidos
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertResolution {
    pub status: AlertStatus,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<i64>,
}

/// Filtros de listagem de alertas
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertFilters {
    #[serde(default)]
    pub patient_id: Option<i64>,
    #[serde(default)]
    pub status: Option<AlertStatus>,
    #[serde(default)]
    pub severity: Option<AlertSeverity>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

impl Default for AlertFilters {
    fn default() -> Self {
        Self {
            patient_id: None,
            status: None,
            severity: None,
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Sessões e auditoria
// ---------------------------------------------------------------------------

/// Sessão de paciente; apenas o hash do token é persistido
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientSession {
    pub id: i64,
    pub patient_id: i64,
    #[serde(skip_serializing)]
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PatientSession {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at > now
    }
}

impl FromRow<'_, SqliteRow> for PatientSession {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            patient_id: row.try_get("patient_id")?,
            token_hash: row.try_get("token_hash")?,
            expires_at: row.try_get("expires_at")?,
            revoked_at: row.try_get("revoked_at")?,
            ip: row.try_get("ip")?,
            user_agent: row.try_get("user_agent")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Registro de sessão a ser inserido
#[derive(Debug, Clone)]
pub struct CreateSession {
    pub patient_id: i64,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Entrada imutável da trilha de auditoria
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub action: String,
    pub entity_type: String,
    pub entity_id: i64,
    pub details: serde_json::Value,
    pub actor_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl FromRow<'_, SqliteRow> for AuditEntry {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        let details: sqlx::types::Json<serde_json::Value> = row.try_get("details")?;
        Ok(Self {
            id: row.try_get("id")?,
            action: row.try_get("action")?,
            entity_type: row.try_get("entity_type")?,
            entity_id: row.try_get("entity_id")?,
            details: details.0,
            actor_id: row.try_get("actor_id")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Entrada de auditoria a ser gravada
#[derive(Debug, Clone)]
pub struct CreateAuditEntry {
    pub action: String,
    pub entity_type: String,
    pub entity_id: i64,
    pub details: serde_json::Value,
    pub actor_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Distingue campo ausente (`None`) de campo nulo (`Some(None)`)
mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S, T>(value: &Option<Option<T>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize,
    {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_enum_round_trip_strings() {
        assert_eq!("no_show".parse::<AppointmentStatus>().unwrap(), AppointmentStatus::NoShow);
        assert_eq!(AppointmentType::Return.to_string(), "return");
        assert!("in_progress".parse::<AppointmentStatus>().is_err());
        assert!(matches!(
            "urgent".parse::<AlertSeverity>(),
            Err(DbError::InvalidEnum { field: "AlertSeverity", .. })
        ));
    }

    #[test]
    fn test_patient_block_is_derived_from_timestamp() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 9, 0, 0).unwrap();
        let mut patient = Patient {
            id: 1,
            cpf: "11111111111".to_string(),
            name: "Maria".to_string(),
            pin_hash: None,
            pin_attempts: 3,
            pin_blocked_until: Some(now + Duration::minutes(15)),
            professional_id: None,
            created_at: now,
        };
        assert!(patient.is_pin_blocked(now));

        patient.pin_blocked_until = Some(now);
        assert!(!patient.is_pin_blocked(now));

        patient.pin_blocked_until = None;
        assert!(!patient.is_pin_blocked(now));
    }

    #[test]
    fn test_patch_distinguishes_missing_and_null_notes() {
        let missing: AppointmentPatch = serde_json::from_str(r#"{"type":"return"}"#).unwrap();
        assert_eq!(missing.notes, None);
        assert_eq!(missing.field_names(), vec!["type"]);

        let cleared: AppointmentPatch = serde_json::from_str(r#"{"notes":null}"#).unwrap();
        assert_eq!(cleared.notes, Some(None));
        assert!(!cleared.is_empty());

        assert!(AppointmentPatch::default().is_empty());
    }

    #[test]
    fn test_patient_hash_is_never_serialized() {
        let patient = Patient {
            id: 7,
            cpf: "22222222222".to_string(),
            name: "João".to_string(),
            pin_hash: Some("$argon2id$v=19$segredo".to_string()),
            pin_attempts: 0,
            pin_blocked_until: None,
            professional_id: Some(3),
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&patient).unwrap();
        assert!(!json.contains("argon2id"));
        assert!(!json.contains("pin_hash"));
    }
}
