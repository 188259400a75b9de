use crate::article::Article;
use crate::interest::{Interest, InterestKind};

/// Builds the verification prompt for one (article, interest) pair.
pub fn build_prompt(article: &Article, interest: &Interest, excerpt_chars: usize) -> String {
    let subject = match interest.kind {
        InterestKind::Question => "question",
        InterestKind::Topic => "topic",
    };

    format!(
        "You decide whether a news article is relevant to a reader's {subject}.\n\
         \n\
         Article title: {title}\n\
         Article excerpt:\n\
         {excerpt}\n\
         \n\
         {heading}: {text}\n\
         \n\
         Answer with a single JSON object and nothing else:\n\
         {{\"match\": true or false, \"confidence\": number between 0 and 1, \"explanation\": \"one short paragraph\"}}\n\
         Set \"match\" to true only if the article directly addresses the {subject}.",
        subject = subject,
        heading = capitalize(subject),
        title = article.title,
        excerpt = article.excerpt(excerpt_chars),
        text = interest.text,
    )
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
