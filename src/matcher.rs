use crate::models::ResumeCategory;

/// Points awarded when any role phrase of a category appears in the title.
pub const TITLE_WEIGHT: u32 = 10;

pub struct KeywordTable {
    pub category: ResumeCategory,
    pub role_types: &'static [&'static str],
    pub skills: &'static [&'static str],
}

// Order matters: ties at equal nonzero score go to the earliest table.
pub const KEYWORDS: [KeywordTable; 3] = [
    KeywordTable {
        category: ResumeCategory::Data,
        role_types: &[
            "Data Analyst",
            "Data Scientist",
            "Data Engineer",
            "Business Intelligence",
            "Analytics Specialist",
            "Visualization Specialist",
            "Machine Learning",
            "Quantitative",
            "Statistical",
            "Database Analyst",
        ],
        skills: &[
            "Python",
            "SQL",
            "R",
            "Tableau",
            "Power BI",
            "data modeling",
            "data analysis",
            "NLP",
            "deep learning",
            "data visualization",
            "big data",
            "Hadoop",
            "Spark",
            "data cleaning",
            "statistical analysis",
            "machine learning",
            "data pipelines",
            "ETL",
            "ML",
            "DL",
            "NN",
            "artificial intelligence",
            "AI",
            "data science",
            "predictive modeling",
            "data warehousing",
            "predictive analytics",
            "data mining",
            "visualization",
        ],
    },
    KeywordTable {
        category: ResumeCategory::Research,
        role_types: &[
            "Research Associate",
            "Research Scientist",
            "Materials Scientist",
            "Academic Researcher",
            "Research Engineer",
            "Research Fellow",
            "Chemical Engineer",
            "Laboratory Technician",
            "Postdoctoral",
            "Research Specialist",
            "Technical Specialist",
            "Process Engineer",
            "Quality Engineer",
        ],
        skills: &[
            "materials science",
            "nanotechnology",
            "CMP",
            "chemical mechanical planarization",
            "laboratory",
            "experimental design",
            "characterization",
            "microscopy",
            "Slurry Analysis",
            "XRD",
            "SEM",
            "TEM",
            "AFM",
            "data analysis",
            "synthesis",
            "process optimization",
            "publications",
            "life cycle assessment",
            "sustainability",
        ],
    },
    KeywordTable {
        category: ResumeCategory::Associate,
        role_types: &[
            "Program Associate",
            "Project Coordinator",
            "Administrative",
            "Office Analyst",
            "Donor Analyst",
            "Operations Associate",
            "Technical Support",
            "Program Manager",
            "Database Coordinator",
            "Research Administrator",
            "Academic Advisor",
            "Student Services",
            "Grant Writer",
        ],
        skills: &[
            "project management",
            "coordination",
            "administration",
            "stakeholder",
            "analyst",
            "communication",
            "documentation",
            "process improvement",
            "support services",
            "Office Analysis",
            "Excel Engineer",
            "program development",
            "grant administration",
        ],
    },
];

/// Category used when nothing matches at all.
pub const FALLBACK: ResumeCategory = ResumeCategory::Associate;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub category: ResumeCategory,
    pub scores: Vec<(ResumeCategory, u32)>,
}

/// Counts distinct keywords contained in `text`.
///
/// Plain case-insensitive substring containment, not word matching, so a
/// short keyword like "R" matches inside any word that contains an r.
pub fn count_matches(text: &str, keywords: &[&str]) -> u32 {
    let text = text.to_lowercase();
    keywords
        .iter()
        .filter(|kw| text.contains(&kw.to_lowercase()))
        .count() as u32
}

pub fn score(title: &str, description: &str) -> Classification {
    let scores: Vec<(ResumeCategory, u32)> = KEYWORDS
        .iter()
        .map(|table| {
            let title_points = if count_matches(title, table.role_types) > 0 {
                TITLE_WEIGHT
            } else {
                0
            };
            (table.category, title_points + count_matches(description, table.skills))
        })
        .collect();

    let mut best = (FALLBACK, 0);
    for &(category, points) in &scores {
        // strict comparison keeps the earlier category on ties
        if points > best.1 {
            best = (category, points);
        }
    }

    Classification {
        category: best.0,
        scores,
    }
}

/// Picks the resume category for a posting. Always returns a value.
pub fn classify(title: &str, description: &str) -> ResumeCategory {
    score(title, description).category
}
