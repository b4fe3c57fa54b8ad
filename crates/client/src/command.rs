//! Command line parsing.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, anyhow, bail};
use socialsync_core::Route;

/// Image size assumed when `image` is given no dimensions.
const DEFAULT_IMAGE_SIZE: (i32, i32) = (400, 350);

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Signup {
        name: String,
        email: String,
        password: String,
        bio: Option<String>,
    },
    Login {
        email: String,
        password: String,
    },
    /// Federated popup sign-in, completing as the given user.
    Google {
        name: String,
        email: String,
    },
    Logout,
    Go(Route),
    Post(String),
    Image {
        path: PathBuf,
        width: i32,
        height: i32,
    },
    Tag {
        x: i32,
        y: i32,
        uid: String,
    },
    Cancel,
    Feed,
    All,
    Follow(String),
    Unfollow(String),
    Like(String),
    Comment {
        post_id: String,
        text: String,
    },
    Comments(String),
    Delete(String),
    Profile,
    Bio(String),
    Help,
    Quit,
}

pub const HELP: &str = "\
signup <name> <email> <password> [bio]   create an account
login <email> <password>                 sign in
google <name> <email>                    sign in through the popup
logout                                   sign out
go <path>                                open /, /allUsers, /profile, /login or /signup
image <file> [width height]              attach an image to the draft
tag <x> <y> <uid>                        tag a user on the attached image
post <text>                              publish the draft
cancel                                   discard the draft
feed                                     show your feed
all                                      list every user
follow <uid> | unfollow <uid>            change who you follow
like <post>                              like or unlike a post
comment <post> <text>                    comment on a post
comments <post>                          show a post's comments
delete <post>                            delete one of your posts
profile                                  show your profile
bio <text>                               change your bio
quit                                     exit";

fn arg<'a>(args: &[&'a str], index: usize, name: &str) -> anyhow::Result<&'a str> {
    args.get(index)
        .copied()
        .ok_or_else(|| anyhow!("Missing <{name}>"))
}

fn rest(args: &[&str], from: usize) -> Option<String> {
    let text = args.get(from..)?.join(" ");
    (!text.is_empty()).then_some(text)
}

fn number(value: &str, name: &str) -> anyhow::Result<i32> {
    value
        .parse()
        .with_context(|| format!("<{name}> must be a whole number"))
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> anyhow::Result<Self> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((&verb, args)) = words.split_first() else {
            bail!("Empty command");
        };

        Ok(match verb {
            "signup" => Self::Signup {
                name: arg(args, 0, "name")?.to_string(),
                email: arg(args, 1, "email")?.to_string(),
                password: arg(args, 2, "password")?.to_string(),
                bio: rest(args, 3),
            },
            "login" => Self::Login {
                email: arg(args, 0, "email")?.to_string(),
                password: arg(args, 1, "password")?.to_string(),
            },
            "google" => Self::Google {
                name: arg(args, 0, "name")?.to_string(),
                email: arg(args, 1, "email")?.to_string(),
            },
            "logout" => Self::Logout,
            "go" => {
                let path = arg(args, 0, "path")?;
                Self::Go(Route::from_path(path).ok_or_else(|| anyhow!("Unknown page {path}"))?)
            }
            "post" => Self::Post(rest(args, 0).unwrap_or_default()),
            "image" => {
                let path = PathBuf::from(arg(args, 0, "file")?);
                let (width, height) = match (args.get(1), args.get(2)) {
                    (Some(w), Some(h)) => (number(w, "width")?, number(h, "height")?),
                    (None, None) => DEFAULT_IMAGE_SIZE,
                    _ => bail!("Give both <width> and <height>, or neither"),
                };
                Self::Image {
                    path,
                    width,
                    height,
                }
            }
            "tag" => Self::Tag {
                x: number(arg(args, 0, "x")?, "x")?,
                y: number(arg(args, 1, "y")?, "y")?,
                uid: arg(args, 2, "uid")?.to_string(),
            },
            "cancel" => Self::Cancel,
            "feed" => Self::Feed,
            "all" => Self::All,
            "follow" => Self::Follow(arg(args, 0, "uid")?.to_string()),
            "unfollow" => Self::Unfollow(arg(args, 0, "uid")?.to_string()),
            "like" => Self::Like(arg(args, 0, "post")?.to_string()),
            "comment" => Self::Comment {
                post_id: arg(args, 0, "post")?.to_string(),
                text: rest(args, 1).ok_or_else(|| anyhow!("Missing <text>"))?,
            },
            "comments" => Self::Comments(arg(args, 0, "post")?.to_string()),
            "delete" => Self::Delete(arg(args, 0, "post")?.to_string()),
            "profile" => Self::Profile,
            "bio" => Self::Bio(rest(args, 0).unwrap_or_default()),
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => bail!("Unknown command {other}; type help"),
        })
    }
}
