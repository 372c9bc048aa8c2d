use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::db::models::GradeEntry;

/// How repeated attempts on the same unit collapse into one grade.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum GradePolicy {
    #[default]
    Highest,
    Latest,
    Average,
}

/// One student's consolidated grade per unit. Rows are keyed by the student
/// identifier; the name is the one used on the student's latest attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct GradebookRow {
    pub(crate) student_id: String,
    pub(crate) student_name: String,
    pub(crate) grades: BTreeMap<String, f64>,
}

/// Student by unit table of consolidated grades, ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub(crate) struct Gradebook {
    pub(crate) policy: GradePolicy,
    pub(crate) units: Vec<String>,
    pub(crate) students: Vec<GradebookRow>,
}

pub(crate) fn consolidate(entries: &[GradeEntry], policy: GradePolicy) -> Gradebook {
    let mut grouped: BTreeMap<(&str, &str), Vec<&GradeEntry>> = BTreeMap::new();
    let mut latest: BTreeMap<&str, &GradeEntry> = BTreeMap::new();
    for entry in entries {
        let student_id = entry.student_id.as_str();
        grouped.entry((student_id, entry.unit.as_str())).or_default().push(entry);
        latest
            .entry(student_id)
            .and_modify(|current| {
                if entry.created_at >= current.created_at {
                    *current = entry;
                }
            })
            .or_insert(entry);
    }

    let mut units = BTreeSet::new();
    let mut grades: BTreeMap<&str, BTreeMap<String, f64>> = BTreeMap::new();
    for ((student_id, unit), attempts) in grouped {
        let Some(grade) = pick(&attempts, policy) else {
            continue;
        };
        units.insert(unit.to_string());
        grades.entry(student_id).or_default().insert(unit.to_string(), grade);
    }

    let mut students: Vec<GradebookRow> = grades
        .into_iter()
        .map(|(student_id, grades)| GradebookRow {
            student_id: student_id.to_string(),
            student_name: latest
                .get(student_id)
                .map(|entry| entry.student_name.clone())
                .unwrap_or_default(),
            grades,
        })
        .collect();
    students.sort_by(|a, b| {
        a.student_name.cmp(&b.student_name).then_with(|| a.student_id.cmp(&b.student_id))
    });

    Gradebook { policy, units: units.into_iter().collect(), students }
}

fn pick(attempts: &[&GradeEntry], policy: GradePolicy) -> Option<f64> {
    match policy {
        GradePolicy::Highest => attempts.iter().map(|entry| entry.grade).reduce(f64::max),
        GradePolicy::Latest => {
            attempts.iter().max_by_key(|entry| entry.created_at).map(|entry| entry.grade)
        }
        GradePolicy::Average => {
            if attempts.is_empty() {
                return None;
            }
            let sum: f64 = attempts.iter().map(|entry| entry.grade).sum();
            Some(sum / attempts.len() as f64)
        }
    }
}
