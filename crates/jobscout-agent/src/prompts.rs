//! Prompt text for the agent and the analysis tools.
//!
//! Wording is not a stable contract; the section headers (`RELEVANT JOB
//! INFORMATION`, `Title:` lines inside job blocks) are what tests rely on.

pub const CONTEXT_HEADER: &str = "RELEVANT JOB INFORMATION:";

const AGENT_POLICY: &str = r#"You are a career assistant for a single employer. You help people explore open positions, understand what each role requires, and plan their next career step.

You can look up job postings in several ways: targeted search, a broad listing of every open position, a side-by-side comparison of two roles, a career-path summary, and a location filter. Use them whenever the answer depends on actual postings.

Never mention internal tools, tool names, or how the system works. Answer as a knowledgeable human advisor would.

When a question is vague, ask for the missing detail instead of guessing.

Act directly. Do not announce what you are about to do, ask permission, or say "let me" or "one moment".

When you receive job data:
- interpret and organize it, never paste it back verbatim
- group listings by category or relevance and highlight key requirements
- for comparisons, summarize the differences and say which role suits which goals

Format answers with short paragraphs, headings, and bullet points, and finish with a useful next step or question."#;

const TOOL_RESULT_NOTE: &str = "You have just received raw results from a lookup. Turn them into a structured, helpful answer for the user; do not repeat the raw output.";

/// System instruction for one model call.
pub fn system_prompt(retrieved_context: &str, has_recent_tool_results: bool) -> String {
    let mut out = AGENT_POLICY.to_string();
    if !retrieved_context.trim().is_empty() {
        out.push_str("\n\n");
        out.push_str(CONTEXT_HEADER);
        out.push('\n');
        out.push_str(retrieved_context);
        out.push_str("\n\nBase answers about positions, requirements, and opportunities on this information.");
    }
    if has_recent_tool_results {
        out.push_str("\n\nIMPORTANT: ");
        out.push_str(TOOL_RESULT_NOTE);
    }
    out
}

pub fn compare_jobs(first_info: &str, second_info: &str, first_title: &str, second_title: &str) -> String {
    format!(
        r#"Act as a career advisor and compare two roles: "{first_title}" and "{second_title}".

Postings for {first_title}:
{first_info}

Postings for {second_title}:
{second_info}

Write a balanced comparison with these sections:

## {first_title} vs {second_title}

### {first_title}
- Primary focus
- Key responsibilities (3-4)
- Required skills
- Experience level
- Work environment (remote / hybrid / onsite, team)

### {second_title}
- Primary focus
- Key responsibilities (3-4)
- Required skills
- Experience level
- Work environment (remote / hybrid / onsite, team)

### Differences and overlap
Skills, day-to-day work, career growth, market demand.

### Which role fits whom
When to choose {first_title}, and when to choose {second_title}.

Give both roles equal attention and keep the advice concrete."#
    )
}

pub fn career_summary(job_info: &str, query: &str) -> String {
    format!(
        r#"Act as a career advisor. Using the postings below, summarize the career path and growth opportunities, answering this question: {query}

Postings:
{job_info}

Cover progression paths, skills to develop, likely next roles, industry outlook, and the long-term view. Keep it focused and actionable."#
    )
}

pub fn location_filter(jobs_info: &str, location: &str) -> String {
    format!(
        r#"From the postings below, keep only the jobs located in or near: {location}

Postings:
{jobs_info}

For each matching job give the title, exact location, a one-line summary, department, and job type. Use the job title as a heading. If nothing matches, suggest nearby locations that do have openings."#
    )
}
