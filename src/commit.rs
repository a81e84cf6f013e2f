use bytes::Bytes;
use serde::Serialize;

/// A single file change to be committed on a branch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CommitRequest {
    pub path: String,
    pub branch: String,
    pub message: String,
    pub content: Bytes,
}

/// The pull request opened once an update has landed on a generated branch.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PullRequest {
    pub title: String,
    pub body: String,
    pub head: String,
    pub base: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Author {
    pub name: String,
    pub email: String,
}

impl Author {
    /// parse splits an author given as `name <email>` into its name and email fields.
    pub fn parse(author: &str) -> Self {
        match author.split_once('<') {
            None => Author {
                name: author.trim().to_string(),
                email: "".to_string(),
            },
            Some((name, email)) => Author {
                name: name.trim().to_string(),
                email: email
                    .trim_matches(|c: char| c.is_whitespace() || c == '<' || c == '>')
                    .to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_author() {
        let (name, email) = ("image-hooks", "bot@example.com");

        assert_eq!(
            Author::parse(&format!("{} <{}>", name, email)),
            Author {
                name: name.into(),
                email: email.into(),
            }
        );

        assert_eq!(
            Author::parse(name),
            Author {
                name: name.into(),
                email: "".into(),
            }
        );

        assert_eq!(
            Author::parse(&format!("<{}>", email)),
            Author {
                name: "".into(),
                email: email.into(),
            }
        );
    }
}
