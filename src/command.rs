/// A parsed, well-formed request line. Verb-specific value validation
/// (does the channel exist, is the count a positive integer) happens in
/// the handler, not here — this layer only checks arity and recognizes
/// the verb.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Subscribe { channel: String },
    Unsubscribe { channel: String },
    Publish { channel: String, content: String },
    Fetch { channel: String },
    Get { channel: String, last_id_raw: String },
    List,
    Info { channel: String },
    Delete { channel: String },
    Retention { channel: String, count_raw: String },
    Ping,
    Whoami,
}

impl Command {
    /// Parses one already-trimmed, non-empty line. On failure, returns
    /// the message body for `ERR {msg}\n` (without the prefix or the
    /// trailing newline — the caller adds both).
    pub fn parse(line: &str) -> Result<Command, String> {
        let mut tokens = line.split_whitespace();
        let verb = tokens.next().ok_or_else(|| "Invalid command".to_string())?;
        let verb = verb.to_ascii_uppercase();
        let rest: Vec<&str> = tokens.collect();

        match verb.as_str() {
            "SUBSCRIBE" => {
                let channel = rest.first().ok_or_else(|| "SUBSCRIBE needs channel".to_string())?;
                Ok(Command::Subscribe { channel: channel.to_string() })
            }
            "UNSUBSCRIBE" => {
                let channel = rest.first().ok_or_else(|| "UNSUBSCRIBE needs channel".to_string())?;
                Ok(Command::Unsubscribe { channel: channel.to_string() })
            }
            "PUBLISH" => {
                if rest.len() < 2 {
                    return Err("PUBLISH needs channel and message".to_string());
                }
                Ok(Command::Publish {
                    channel: rest[0].to_string(),
                    content: rest[1..].join(" "),
                })
            }
            "FETCH" => {
                let channel = rest.first().ok_or_else(|| "FETCH needs channel".to_string())?;
                Ok(Command::Fetch { channel: channel.to_string() })
            }
            "GET" => {
                if rest.len() < 2 {
                    return Err("GET needs channel and id".to_string());
                }
                Ok(Command::Get {
                    channel: rest[0].to_string(),
                    last_id_raw: rest[1].to_string(),
                })
            }
            "LIST" => Ok(Command::List),
            "INFO" => {
                let channel = rest.first().ok_or_else(|| "INFO needs channel".to_string())?;
                Ok(Command::Info { channel: channel.to_string() })
            }
            "DELETE" => {
                let channel = rest.first().ok_or_else(|| "DELETE needs channel".to_string())?;
                Ok(Command::Delete { channel: channel.to_string() })
            }
            "RETENTION" => {
                if rest.len() < 2 {
                    return Err("RETENTION needs channel and count".to_string());
                }
                Ok(Command::Retention {
                    channel: rest[0].to_string(),
                    count_raw: rest[1].to_string(),
                })
            }
            "PING" => Ok(Command::Ping),
            "WHOAMI" => Ok(Command::Whoami),
            _ => Err("Invalid command".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_subscribe() {
        assert_eq!(
            Command::parse("SUBSCRIBE general").unwrap(),
            Command::Subscribe { channel: "general".to_string() }
        );
    }

    #[test]
    fn verb_is_case_insensitive_but_channel_is_not() {
        assert_eq!(
            Command::parse("subscribe General").unwrap(),
            Command::Subscribe { channel: "General".to_string() }
        );
    }

    #[test]
    fn publish_joins_remaining_tokens_as_content() {
        assert_eq!(
            Command::parse("PUBLISH general hello there world").unwrap(),
            Command::Publish { channel: "general".to_string(), content: "hello there world".to_string() }
        );
    }

    #[test]
    fn missing_args_yield_verb_specific_errors() {
        assert_eq!(Command::parse("SUBSCRIBE").unwrap_err(), "SUBSCRIBE needs channel");
        assert_eq!(Command::parse("PUBLISH general").unwrap_err(), "PUBLISH needs channel and message");
        assert_eq!(Command::parse("GET general").unwrap_err(), "GET needs channel and id");
        assert_eq!(Command::parse("RETENTION general").unwrap_err(), "RETENTION needs channel and count");
    }

    #[test]
    fn unknown_verb_is_invalid_command() {
        assert_eq!(Command::parse("FROBNICATE general").unwrap_err(), "Invalid command");
    }

    #[test]
    fn zero_arg_verbs_parse_without_remainder() {
        assert_eq!(Command::parse("LIST").unwrap(), Command::List);
        assert_eq!(Command::parse("PING").unwrap(), Command::Ping);
        assert_eq!(Command::parse("WHOAMI").unwrap(), Command::Whoami);
    }
}
