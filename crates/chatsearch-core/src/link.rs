//! Recognises shareable message links typed or pasted into the search field.

use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkTarget {
    Username(String),
    /// Numeric channel id from a `/c/` link
    PrivateChannel(i64),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageLink {
    pub target: LinkTarget,
    pub message_id: i32,
}

const WEB_HOSTS: [&str; 4] = ["t.me", "telegram.me", "www.t.me", "www.telegram.me"];

/// Parses `t.me/name/123`, `https://t.me/c/12345/67` and
/// `tg://resolve?domain=name&post=5` style links.
pub fn parse_message_link(query: &str) -> Option<MessageLink> {
    let query = query.trim();
    if let Some(rest) = strip_prefix_ignore_case(query, "tg://") {
        return parse_deep_link(rest);
    }

    let rest = strip_prefix_ignore_case(query, "https://")
        .or_else(|| strip_prefix_ignore_case(query, "http://"))
        .unwrap_or(query);
    let (host, path) = rest.split_once('/')?;
    if !WEB_HOSTS.iter().any(|known| host.eq_ignore_ascii_case(known)) {
        return None;
    }

    let path = path.split(['?', '#']).next().unwrap_or_default();
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    match segments.as_slice() {
        ["c", channel, message] => Some(MessageLink {
            target: LinkTarget::PrivateChannel(channel.parse().ok()?),
            message_id: parse_message_id(message)?,
        }),
        [username, message] if is_username(username) => Some(MessageLink {
            target: LinkTarget::Username((*username).to_string()),
            message_id: parse_message_id(message)?,
        }),
        _ => None,
    }
}

fn parse_deep_link(rest: &str) -> Option<MessageLink> {
    let (action, params) = rest.split_once('?')?;
    let param = |key: &str| {
        params
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(name, _)| *name == key)
            .map(|(_, value)| value)
    };

    let message_id = parse_message_id(param("post")?)?;
    let target = match action {
        "resolve" => {
            let domain = param("domain")?;
            if !is_username(domain) {
                return None;
            }
            LinkTarget::Username(domain.to_string())
        }
        "privatepost" => LinkTarget::PrivateChannel(param("channel")?.parse().ok()?),
        _ => return None,
    };
    Some(MessageLink { target, message_id })
}

fn parse_message_id(text: &str) -> Option<i32> {
    text.parse::<i32>().ok().filter(|id| *id > 0)
}

fn is_username(text: &str) -> bool {
    !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !text.starts_with(|c: char| c.is_ascii_digit())
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &text[prefix.len()..])
}
