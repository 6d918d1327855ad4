use crate::model::Question;

#[derive(Debug, Clone, Copy)]
pub struct CategoryDef {
    pub id: &'static str,
    pub name: &'static str,
    pub question_ids: &'static [&'static str],
}

/// Feedback categories: twenty standard questions, five per category.
pub const FEEDBACK_CATEGORIES: &[CategoryDef] = &[
    CategoryDef {
        id: "CAT1",
        name: "Planning & Organisation",
        question_ids: &["FQ1", "FQ2", "FQ3", "FQ4", "FQ5"],
    },
    CategoryDef {
        id: "CAT2",
        name: "Communication & Presentation",
        question_ids: &["FQ6", "FQ7", "FQ8", "FQ9", "FQ10"],
    },
    CategoryDef {
        id: "CAT3",
        name: "Student Participation",
        question_ids: &["FQ11", "FQ12", "FQ13", "FQ14", "FQ15"],
    },
    CategoryDef {
        id: "CAT4",
        name: "Class Management",
        question_ids: &["FQ16", "FQ17", "FQ18", "FQ19", "FQ20"],
    },
];

const STANDARD_FEEDBACK_TEXT: &[(&str, &str)] = &[
    ("FQ1", "Teacher comes to the class in time"),
    ("FQ2", "Teaching is well planned"),
    ("FQ3", "Aim/Objectives made clear"),
    ("FQ4", "Subject matter organised in logical sequence"),
    ("FQ5", "Teacher comes well prepared in the subject"),
    ("FQ6", "Teacher speaks clearly and audibly"),
    ("FQ7", "Teacher writes and draws legibly"),
    (
        "FQ8",
        "Teacher provides examples of concepts/principles. Explanations are clear and effective",
    ),
    (
        "FQ9",
        "Teacher's pace and level of instruction are suited to the attainment of students",
    ),
    (
        "FQ10",
        "Teacher offers assistance and counselling to the needy students",
    ),
    (
        "FQ11",
        "Teacher asks questions to promote interaction and reflective thinking",
    ),
    (
        "FQ12",
        "Teacher encourages questioning/raising doubts by students and answers them well",
    ),
    (
        "FQ13",
        "Teacher shares learner activity and problem solving in the class",
    ),
    (
        "FQ14",
        "Teacher encourages, compliments and praises originality and creativity displayed by the student",
    ),
    (
        "FQ15",
        "Teacher is courteous and impartial in dealing with the students",
    ),
    (
        "FQ16",
        "Teacher engages classes regularly and maintains discipline",
    ),
    (
        "FQ17",
        "Teacher covers the syllabus completely and at appropriate pace",
    ),
    (
        "FQ18",
        "Teacher holds tests regularly which help students build confidence in applying knowledge",
    ),
    ("FQ19", "Teacher's marking of scripts is fair and impartial"),
    (
        "FQ20",
        "Teacher is prompt in valuing and returning the answer scripts providing feedback on performance",
    ),
];

/// The question set a course gets when it is created without feedback questions.
pub fn standard_feedback_questions() -> Vec<Question> {
    STANDARD_FEEDBACK_TEXT
        .iter()
        .map(|(id, text)| Question::new(id, text))
        .collect()
}
