use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Login { user_id: String, key_id: String }, // /login <user> <key>
    Load(PathBuf),                             // /load <roster.csv>
    Proxy(Option<String>),                     // /proxy <addr> | /proxy | /proxy -
    Start,                                     // /start
    Next,                                      // /next
    Profiles,                                  // /profiles
    Rename { old: String, new: String },       // /rename <old> <new>
    Delete(String),                            // /delete <profile>
    Help,                                      // /help
    Quit,                                      // /quit or /exit
    Usage(&'static str),
    Unknown(String),
}

pub fn parse_command(input: &str) -> Command {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return Command::Unknown(trimmed.to_string());
    }
    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let verb = parts.next().unwrap_or_default();
    let rest = parts.next().map(str::trim).filter(|s| !s.is_empty());

    match verb {
        "/login" => match rest.map(|r| r.split_whitespace().collect::<Vec<_>>()) {
            Some(args) if args.len() == 2 => Command::Login {
                user_id: args[0].to_string(),
                key_id: args[1].to_string(),
            },
            _ => Command::Usage("/login <user-id> <key-id>"),
        },
        "/load" => match rest {
            Some(path) => Command::Load(PathBuf::from(path)),
            None => Command::Usage("/load <roster.csv>"),
        },
        "/proxy" => match rest {
            None => Command::Proxy(None),
            Some("-") => Command::Proxy(Some(String::new())),
            Some(addr) => Command::Proxy(Some(addr.to_string())),
        },
        "/start" => Command::Start,
        "/next" => Command::Next,
        "/profiles" => Command::Profiles,
        "/rename" => match rest.map(|r| r.split_whitespace().collect::<Vec<_>>()) {
            Some(args) if args.len() == 2 => Command::Rename {
                old: args[0].to_string(),
                new: args[1].to_string(),
            },
            _ => Command::Usage("/rename <old> <new>"),
        },
        "/delete" => match rest {
            Some(name) => Command::Delete(name.to_string()),
            None => Command::Usage("/delete <profile>"),
        },
        "/help" => Command::Help,
        "/quit" | "/exit" => Command::Quit,
        _ => Command::Unknown(trimmed.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_batch_commands() {
        assert_eq!(parse_command("/start"), Command::Start);
        assert_eq!(parse_command("  /next  "), Command::Next);
        assert_eq!(parse_command("/profiles"), Command::Profiles);
        assert_eq!(parse_command("/quit"), Command::Quit);
        assert_eq!(parse_command("/exit"), Command::Quit);
    }

    #[test]
    fn parses_login_pair() {
        assert_eq!(
            parse_command("/login op-1 key-abc"),
            Command::Login {
                user_id: "op-1".into(),
                key_id: "key-abc".into(),
            }
        );
        assert!(matches!(parse_command("/login op-1"), Command::Usage(_)));
        assert!(matches!(parse_command("/login"), Command::Usage(_)));
    }

    #[test]
    fn parses_load_path_with_spaces_preserved() {
        assert_eq!(
            parse_command("/load batches/august profiles.csv"),
            Command::Load(PathBuf::from("batches/august profiles.csv"))
        );
    }

    #[test]
    fn proxy_show_set_and_clear() {
        assert_eq!(parse_command("/proxy"), Command::Proxy(None));
        assert_eq!(
            parse_command("/proxy user:pw@10.0.0.1:8080"),
            Command::Proxy(Some("user:pw@10.0.0.1:8080".into()))
        );
        assert_eq!(parse_command("/proxy -"), Command::Proxy(Some(String::new())));
    }

    #[test]
    fn parses_rename_and_delete() {
        assert_eq!(
            parse_command("/rename old-name new-name"),
            Command::Rename {
                old: "old-name".into(),
                new: "new-name".into(),
            }
        );
        assert!(matches!(parse_command("/rename only-one"), Command::Usage(_)));
        assert_eq!(
            parse_command("/delete stale-profile"),
            Command::Delete("stale-profile".into())
        );
    }

    #[test]
    fn unknown_verbs_are_reported_verbatim() {
        assert_eq!(
            parse_command("/frobnicate now"),
            Command::Unknown("/frobnicate now".into())
        );
        assert_eq!(parse_command("hello"), Command::Unknown("hello".into()));
    }
}
