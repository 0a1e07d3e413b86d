//! Prompt text for hypothesis generation and validation.

use antidote_core::{Excerpt, GenerationRequest, ValidationRequest};

pub const GENERATION_SYSTEM: &str = "\
You are a data forensics expert specializing in identifying patterns of bad or \
poisoned data in LLM training datasets. Analyze the provided files and propose \
ONE hypothesis about which files contain bad data, together with a filter \
predicate that tests it.

The predicate is a single expression over two string variables, `name` (the \
file name) and `content` (the file text), evaluating to true for suspected bad \
files. Allowed: string/number/boolean literals, list and tuple literals, \
`and`/`or`/`not`, comparisons (`==`, `!=`, `<`, `<=`, `>`, `>=`, `in`, `not in`), \
arithmetic, indexing and slicing, conditional expressions, generator \
expressions and comprehensions inside `any`/`all`/`sum`, the functions \
len, any, all, sum, min, max, abs, int, float, str, bool, ord, set, sorted, list, \
the string methods lower, upper, casefold, strip, lstrip, rstrip, startswith, \
endswith, count, find, split, splitlines, replace, isdigit, isalpha, isalnum, \
isspace, isupper, islower, istitle, isascii, and re.search, re.match, \
re.fullmatch, re.findall with literal patterns. Nothing else is available: no \
imports, no file or network access, no assignments, no lambdas.

Your hypothesis MUST differ from previous hypotheses. Consider file naming \
patterns, content length or structure, special character distributions, \
formatting, language abnormalities, and statistical outliers.

Respond with ONLY a JSON object: {\"description\": \"...\", \"predicate\": \"...\"}";

pub const VALIDATION_SYSTEM: &str = "\
You are a data quality expert evaluating whether files contain bad, \
low-quality, or poisoned data. Judge each file independently.

Respond with ONLY a JSON object mapping each file name to true (bad data) or \
false (clean), for example {\"12.txt\": true, \"40.txt\": false}";

pub fn generation_user(request: &GenerationRequest) -> String {
    let mut out = String::from(
        "I need to identify potentially bad or poisoned data in an LLM training dataset. \
         Below are samples from the dataset:\n\n",
    );
    push_samples(&mut out, &request.samples);

    if !request.history.is_empty() {
        out.push_str(&format!(
            "\nFor run #{}, your hypothesis MUST be substantially different from these:\n{}",
            request.iteration, request.history
        ));
    }
    if let Some(feedback) = &request.feedback {
        out.push_str("\n");
        out.push_str(feedback);
        out.push('\n');
    }
    out.push_str(
        "\nBased on these samples, give one hypothesis that can be tested with a simple rule \
         (like \"files with even numbers in their names\" or \"files containing links\") \
         and the predicate that implements it.",
    );
    out
}

pub fn validation_user(request: &ValidationRequest) -> String {
    let mut out = format!(
        "Hypothesis: {}\n\nFor each file below, decide whether it truly is bad data. Common \
         signs of poisoning: repetitive patterns or strange formatting, irrelevant or \
         misleading content, corruption or manipulation, text that makes no logical sense, \
         unnatural language.\n\n",
        request.hypothesis
    );
    push_samples(&mut out, &request.files);
    out
}

fn push_samples(out: &mut String, samples: &[Excerpt]) {
    for s in samples {
        out.push_str(&format!("Filename: {}\nContent: {}\n\n", s.name, s.content));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn excerpt(name: &str, content: &str) -> Excerpt {
        Excerpt {
            name: name.into(),
            content: content.into(),
        }
    }

    #[test]
    fn first_iteration_has_no_history_block() {
        let prompt = generation_user(&GenerationRequest {
            iteration: 1,
            samples: vec![excerpt("1.txt", "hello")],
            history: String::new(),
            feedback: None,
        });
        assert!(prompt.contains("Filename: 1.txt\nContent: hello"));
        assert!(!prompt.contains("substantially different"));
    }

    #[test]
    fn history_and_feedback_are_included() {
        let prompt = generation_user(&GenerationRequest {
            iteration: 3,
            samples: vec![],
            history: "1. empty files\n".into(),
            feedback: Some("rejected: duplicate".into()),
        });
        assert!(prompt.contains("run #3"));
        assert!(prompt.contains("1. empty files"));
        assert!(prompt.contains("rejected: duplicate"));
    }
}
