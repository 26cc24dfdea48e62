#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Reload,
    /// The view came back into focus; refreshes like `Reload`.
    Focus,
    Add(String),
    Remove(String),
    List,
    Help,
    Quit,
}

pub const HELP: &str =
    "commands: reload (r), focus, add <name or symbol>, remove <id>, list, help, quit";

impl Command {
    pub fn parse(line: &str) -> Result<Command, String> {
        let line = line.trim();
        let (verb, arg) = match line.split_once(char::is_whitespace) {
            Some((verb, arg)) => (verb, arg.trim()),
            None => (line, ""),
        };

        match verb.to_lowercase().as_str() {
            "reload" | "r" => Ok(Command::Reload),
            "focus" => Ok(Command::Focus),
            "list" | "ls" => Ok(Command::List),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" | "q" => Ok(Command::Quit),
            "add" | "remove" | "rm" if arg.is_empty() => {
                Err(format!("`{}` needs an argument", verb))
            }
            "add" => Ok(Command::Add(arg.to_string())),
            "remove" | "rm" => Ok(Command::Remove(arg.to_string())),
            "" => Err("empty command".to_string()),
            other => Err(format!("unknown command `{}`", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(Ok(Command::Reload), Command::parse("reload"));
        assert_eq!(Ok(Command::Reload), Command::parse("  R "));
        assert_eq!(Ok(Command::Focus), Command::parse("focus"));
        assert_eq!(Ok(Command::List), Command::parse("list"));
        assert_eq!(Ok(Command::Quit), Command::parse("exit"));
    }

    #[test]
    fn test_parse_arguments_keep_inner_spaces() {
        assert_eq!(
            Ok(Command::Add("shiba inu".to_string())),
            Command::parse("add   shiba inu ")
        );
        assert_eq!(
            Ok(Command::Remove("bitcoin".to_string())),
            Command::parse("rm bitcoin")
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(Command::parse("add").is_err());
        assert!(Command::parse("").is_err());
        assert_eq!(
            Err("unknown command `buy`".to_string()),
            Command::parse("buy btc")
        );
    }
}
