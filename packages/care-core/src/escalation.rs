//! Regra de escalonamento de ocorrências relatadas pelo paciente
//!
//! Uma única regra: origem `patient` gera exatamente um alerta aberto cuja
//! gravidade depende só da intensidade (`>= 8` alta, `[4, 8)` média,
//! `< 4` baixa).

use common_db::models::{AlertSeverity, AlertStatus, CreateAlert, Occurrence, OccurrenceSource};

/// Tipo dos alertas gerados por relato de sintoma
pub const PATIENT_SYMPTOM_ALERT_KIND: &str = "sintoma_paciente";

pub const HIGH_INTENSITY: f64 = 8.0;
pub const MEDIUM_INTENSITY: f64 = 4.0;

/// Gravidade derivada da intensidade; valor não finito é `low`
pub fn severity_for_intensity(intensity: f64) -> AlertSeverity {
    if !intensity.is_finite() {
        return AlertSeverity::Low;
    }
    if intensity >= HIGH_INTENSITY {
        AlertSeverity::High
    } else if intensity >= MEDIUM_INTENSITY {
        AlertSeverity::Medium
    } else {
        AlertSeverity::Low
    }
}

/// Texto legível do alerta
pub fn alert_details(kind: &str, intensity: f64, notes: Option<&str>) -> String {
    let shown = if intensity.is_finite() {
        intensity.clamp(0.0, 10.0)
    } else {
        0.0
    };
    let mut details = format!("Paciente relatou \"{}\" com intensidade {}/10.", kind, shown);
    if let Some(notes) = notes.map(str::trim).filter(|n| !n.is_empty()) {
        details.push_str(&format!(" Observações: {}.", notes));
    }
    details
}

/// Alerta a criar para a ocorrência, se houver
///
/// O `created_at` do alerta é o da ocorrência que o originou.
pub fn alert_for_occurrence(occurrence: &Occurrence) -> Option<CreateAlert> {
    if occurrence.source != OccurrenceSource::Patient {
        return None;
    }
    let intensity = f64::from(occurrence.intensity);
    Some(CreateAlert {
        patient_id: occurrence.patient_id,
        kind: PATIENT_SYMPTOM_ALERT_KIND.to_string(),
        severity: severity_for_intensity(intensity),
        status: AlertStatus::Open,
        details: Some(alert_details(
            &occurrence.kind,
            intensity,
            occurrence.notes.as_deref(),
        )),
        created_at: occurrence.created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_severity_boundaries() {
        assert_eq!(severity_for_intensity(10.0), AlertSeverity::High);
        assert_eq!(severity_for_intensity(8.0), AlertSeverity::High);
        assert_eq!(severity_for_intensity(7.9), AlertSeverity::Medium);
        assert_eq!(severity_for_intensity(4.0), AlertSeverity::Medium);
        assert_eq!(severity_for_intensity(3.9), AlertSeverity::Low);
        assert_eq!(severity_for_intensity(0.0), AlertSeverity::Low);
        assert_eq!(severity_for_intensity(f64::NAN), AlertSeverity::Low);
        assert_eq!(severity_for_intensity(f64::INFINITY), AlertSeverity::Low);
    }

    #[test]
    fn test_details_text() {
        assert_eq!(
            alert_details("Febre alta", 9.0, None),
            "Paciente relatou \"Febre alta\" com intensidade 9/10."
        );
        assert_eq!(
            alert_details("Dor", 12.0, Some(" desde ontem ")),
            "Paciente relatou \"Dor\" com intensidade 10/10. Observações: desde ontem."
        );
        assert_eq!(
            alert_details("Tontura", -1.0, Some("   ")),
            "Paciente relatou \"Tontura\" com intensidade 0/10."
        );
    }

    #[test]
    fn test_only_patient_source_escalates() {
        let created_at = Utc.with_ymd_and_hms(2024, 5, 10, 9, 30, 0).unwrap();
        let mut occurrence = Occurrence {
            id: 1,
            patient_id: 5,
            professional_id: 2,
            kind: "Febre alta".to_string(),
            intensity: 9,
            source: OccurrenceSource::Patient,
            notes: None,
            created_at,
        };

        let alert = alert_for_occurrence(&occurrence).unwrap();
        assert_eq!(alert.kind, PATIENT_SYMPTOM_ALERT_KIND);
        assert_eq!(alert.severity, AlertSeverity::High);
        assert_eq!(alert.status, AlertStatus::Open);
        assert_eq!(alert.created_at, created_at);
        assert!(alert
            .details
            .unwrap()
            .contains("Febre alta\" com intensidade 9/10"));

        occurrence.source = OccurrenceSource::Professional;
        assert!(alert_for_occurrence(&occurrence).is_none());
    }
}
