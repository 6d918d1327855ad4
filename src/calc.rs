use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::categories::{CategoryDef, FEEDBACK_CATEGORIES};
use crate::model::{AnswerRecord, Course, Question};

/// Value → occurrence count. Buckets 1..=5 are always present; legacy
/// out-of-domain values get their own keys.
pub type Distribution = BTreeMap<i64, u32>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionStat {
    pub question_id: String,
    pub question_text: String,
    pub average: f64,
    pub count: u32,
    pub distribution: Distribution,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStat {
    pub id: String,
    pub name: String,
    /// Unweighted mean of the member question averages. 0 when `member_count` is 0.
    pub average: f64,
    pub member_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSummary {
    pub total_responses: usize,
    pub question_stats: Vec<QuestionStat>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackSummary {
    pub total_responses: usize,
    pub question_stats: Vec<QuestionStat>,
    pub categories: Vec<CategoryStat>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseReport {
    pub course_id: String,
    pub course_code: String,
    pub course_name: String,
    pub survey: FormSummary,
    pub feedback: FeedbackSummary,
}

pub fn empty_distribution() -> Distribution {
    (1..=5).map(|v| (v, 0)).collect()
}

/// Mean of `sum / count` rounded half-up to 2 decimals.
///
/// Works on the integer sum so ties such as x.xx5 are exact:
/// `floor((200*sum + count) / (2*count)) / 100`.
fn mean_rounded_2(sum: i64, count: u32) -> f64 {
    let count = i64::from(count);
    let scaled = (200 * sum + count).div_euclid(2 * count);
    scaled as f64 / 100.0
}

/// Half-up rounding of an already computed float, for display values.
pub fn round_half_up(x: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (x * factor + 0.5).floor() / factor
}

/// One entry per configured question, in configured order, even when nobody
/// answered it.
pub fn aggregate(records: &[AnswerRecord], questions: &[Question]) -> Vec<QuestionStat> {
    let mut values: HashMap<&str, Vec<i64>> = HashMap::new();
    for r in records {
        for a in &r.answers {
            values.entry(a.question_id.as_str()).or_default().push(a.value);
        }
    }

    questions
        .iter()
        .map(|q| {
            let mut distribution = empty_distribution();
            let Some(vals) = values.get(q.question_id.as_str()).filter(|v| !v.is_empty()) else {
                return QuestionStat {
                    question_id: q.question_id.clone(),
                    question_text: q.text.clone(),
                    average: 0.0,
                    count: 0,
                    distribution,
                };
            };
            for v in vals {
                *distribution.entry(*v).or_insert(0) += 1;
            }
            let count = vals.len() as u32;
            QuestionStat {
                question_id: q.question_id.clone(),
                question_text: q.text.clone(),
                average: mean_rounded_2(vals.iter().sum(), count),
                count,
                distribution,
            }
        })
        .collect()
}

pub fn category_average(category: &CategoryDef, stats: &[QuestionStat]) -> CategoryStat {
    let members: Vec<f64> = category
        .question_ids
        .iter()
        .filter_map(|id| stats.iter().find(|s| s.question_id == *id))
        .filter(|s| s.count > 0)
        .map(|s| s.average)
        .collect();
    let average = if members.is_empty() {
        0.0
    } else {
        members.iter().sum::<f64>() / members.len() as f64
    };
    CategoryStat {
        id: category.id.to_string(),
        name: category.name.to_string(),
        average,
        member_count: members.len(),
    }
}

pub fn feedback_categories(stats: &[QuestionStat]) -> Vec<CategoryStat> {
    FEEDBACK_CATEGORIES
        .iter()
        .map(|c| category_average(c, stats))
        .collect()
}

/// 1 → 0%, 5 → 100%. Used by the feedback category view.
pub fn linear_percentage(average: f64) -> f64 {
    (average - 1.0) / 4.0 * 100.0
}

/// 1 → 20%, 5 → 100%. Used by the survey (course outcome) view.
pub fn ordinal_percentage(average: f64) -> f64 {
    average * 20.0
}

/// Respondents who rated 3 or higher.
pub fn count_above_threshold(distribution: &Distribution) -> u32 {
    [3, 4, 5]
        .iter()
        .map(|v| distribution.get(v).copied().unwrap_or(0))
        .sum()
}

pub fn course_report(
    course: &Course,
    survey_records: &[AnswerRecord],
    feedback_records: &[AnswerRecord],
) -> CourseReport {
    let survey_stats = aggregate(survey_records, &course.survey_questions);
    let feedback_stats = aggregate(feedback_records, &course.feedback_questions);
    let recommendations = feedback_records
        .iter()
        .filter_map(|r| r.recommendation.as_deref())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    CourseReport {
        course_id: course.id.clone(),
        course_code: course.course_code.clone(),
        course_name: course.course_name.clone(),
        survey: FormSummary {
            total_responses: survey_records.len(),
            question_stats: survey_stats,
        },
        feedback: FeedbackSummary {
            total_responses: feedback_records.len(),
            categories: feedback_categories(&feedback_stats),
            question_stats: feedback_stats,
            recommendations,
        },
    }
}
