// Stage templates for the resume rating pipeline.
// Placeholders are `{key}` blackboard keys; the stage resolves them before calling out.

pub const EXPERIENCE_SUMMARY_TEMPLATE: &str = "\
List the candidate's key work experiences as 3 to 5 short bullet points.

Resume:
{resume_text}";

pub const RED_FLAGS_TEMPLATE: &str = "\
Review the resume below for red flags:
- buzzwords with no supporting detail
- gaps or overlaps in the employment timeline
- vague, inflated, or implausible claims

List each red flag on its own line, or answer \"none\".

Resume:
{resume_text}";

pub const SENIORITY_TEMPLATE: &str = "\
From the experience summary below, estimate the candidate's seniority.
Answer with exactly one of: Junior, Mid, Senior, Lead.

Experience summary:
{experience_summary}";

pub const SALARY_TEMPLATE: &str = "\
From the experience summary below, estimate the candidate's expected monthly salary \
in their likely location. Give a range and the currency.

Experience summary:
{experience_summary}";

pub const CULTURE_FIT_TEMPLATE: &str = "\
From the experience summary below, assess how well the candidate would fit:
- fast-paced startups
- structured corporate teams
- remote-first environments

Give one line per environment.

Experience summary:
{experience_summary}";

pub const CLASSIFY_TEMPLATE: &str = "\
Classify this resume into exactly one category:
- excellent: strong, directly relevant experience
- normal: some relevant experience
- bad: little or no relevant experience
- fake: generic, suspicious, or fabricated

Reply with the single lowercase category word and nothing else.

Resume:
{resume_text}";

pub const EXPLAIN_TEMPLATE: &str = "\
Explain in a short paragraph why this resume received the rating below.

Resume:
{resume_text}

Rating:
{rating}";
