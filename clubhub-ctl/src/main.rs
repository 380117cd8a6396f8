use std::{collections::VecDeque, sync::Arc};

use anyhow::Context;
use clubhub_client::{
    api::{AuthToken, ClubId, Comment, CommentId, NewPost, NewSession, NewUser, PostId, UserId, Uuid},
    CommentTree, PostMsg, PostView,
};

mod api;
use api::HttpBackend;

#[derive(structopt::StructOpt)]
struct Opt {
    #[structopt(short, long)]
    host: String,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(structopt::StructOpt)]
enum Command {
    /// Log in, printing the token to set as CLUBHUB_TOKEN
    Login { user: String, password: String },

    /// Print the id of the logged-in user
    Whoami,

    /// Print the comments of a post
    Comments { post: i64 },

    /// Comment on a post
    Comment {
        post: i64,

        content: String,

        /// Comment to reply to
        #[structopt(short, long)]
        parent: Option<i64>,
    },

    /// Edit one of your comments
    Edit {
        post: i64,
        comment: i64,
        content: String,
    },

    /// Delete one of your comments
    Delete {
        post: i64,
        comment: i64,

        /// Do not only print what would be deleted
        #[structopt(short, long)]
        yes: bool,
    },

    /// Like or unlike a post
    Like { post: i64 },

    /// Create a user
    CreateUser {
        /// Username
        name: String,

        password: String,

        #[structopt(long)]
        avatar: Option<String>,
    },

    /// Create a post
    CreatePost {
        club: i64,
        author: i64,
        content: String,
    },
}

fn token_from_env(var: &str) -> anyhow::Result<AuthToken> {
    let tok = std::env::var(var).with_context(|| format!("retrieving {var} environment variable"))?;
    let tok = Uuid::try_parse(&tok).with_context(|| format!("parsing {var} as an auth token"))?;
    Ok(AuthToken(tok))
}

/// Applies `msg`, then runs the requests it triggers and those their answers
/// trigger, until the view settles
async fn step(view: &mut PostView, backend: &HttpBackend, msg: PostMsg) {
    let mut effects = VecDeque::from(view.update(msg));
    while let Some(e) = effects.pop_front() {
        if let Some(answer) = e.run(backend, backend).await {
            effects.extend(view.update(answer));
        }
    }
}

/// Fails with the notices the view raised, if any
fn check_notices(view: &mut PostView) -> anyhow::Result<()> {
    let notices = view.take_notices();
    if notices.is_empty() {
        return Ok(());
    }
    let text = notices
        .iter()
        .map(|n| format!("{:?}: {}", n.level, n.text))
        .collect::<Vec<_>>()
        .join("\n");
    Err(anyhow::anyhow!(text))
}

async fn open_view(backend: &HttpBackend, post: i64) -> anyhow::Result<PostView> {
    let me = backend.whoami().await.context("checking CLUBHUB_TOKEN")?;
    let mut view = PostView::new(PostId(post), 0, Arc::new(me));
    step(&mut view, backend, PostMsg::Reload).await;
    check_notices(&mut view)?;
    Ok(view)
}

fn print_comment(tree: &CommentTree, c: &Comment, indent: &str) {
    let edited = match c.edited {
        true => " (edited)",
        false => "",
    };
    println!(
        "{indent}#{} @{}, {}{edited}",
        c.id.0,
        c.author_name,
        c.created_at.format("%Y-%m-%d %H:%M")
    );
    if let Some(annotation) = tree.reply_annotation(c) {
        println!("{indent}  {annotation}");
    }
    for line in c.content.lines() {
        println!("{indent}  {line}");
    }
}

fn print_tree(tree: &CommentTree) {
    if tree.is_empty() {
        println!("no comments yet");
    }
    for root in tree.roots() {
        print_comment(tree, root, "");
        for r in root.replies.iter() {
            print_comment(tree, r, "    ");
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let opt = <Opt as structopt::StructOpt>::from_args();
    let host = opt.host;
    let user_backend = || -> anyhow::Result<HttpBackend> {
        Ok(HttpBackend::new(host.clone(), token_from_env("CLUBHUB_TOKEN")?))
    };
    let admin_backend = || -> anyhow::Result<HttpBackend> {
        Ok(HttpBackend::new(host.clone(), token_from_env("ADMIN_TOKEN")?))
    };

    match opt.cmd {
        Command::Login { user, password } => {
            let tok = api::auth(&host, &NewSession::new(user, password))
                .await
                .context("logging in")?;
            println!("{}", tok.0);
        }
        Command::Whoami => {
            println!("{}", user_backend()?.whoami().await?.0);
        }
        Command::Comments { post } => {
            let backend = user_backend()?;
            let view = open_view(&backend, post).await?;
            let likes = view.likes();
            println!(
                "{} comments, {}",
                view.tree().len(),
                match likes.is_liked {
                    true => "liked by you",
                    false => "not liked by you",
                }
            );
            print_tree(view.tree());
        }
        Command::Comment {
            post,
            content,
            parent,
        } => {
            let backend = user_backend()?;
            let mut view = open_view(&backend, post).await?;
            match parent {
                None => {
                    step(&mut view, &backend, PostMsg::SetDraft(content)).await;
                    step(&mut view, &backend, PostMsg::SubmitComment).await;
                }
                Some(parent) => {
                    step(&mut view, &backend, PostMsg::OpenReply(CommentId(parent))).await;
                    if view.reply_box().is_none() {
                        anyhow::bail!("post {post} has no comment #{parent}");
                    }
                    step(&mut view, &backend, PostMsg::SetReplyDraft(content)).await;
                    step(&mut view, &backend, PostMsg::SubmitReply).await;
                }
            }
            check_notices(&mut view)?;
        }
        Command::Edit {
            post,
            comment,
            content,
        } => {
            let backend = user_backend()?;
            let club: ClubId = backend.fetch_post(PostId(post)).await?.club_id;
            let backend = backend.with_club(club);
            let mut view = open_view(&backend, post).await?;
            step(&mut view, &backend, PostMsg::StartEdit(CommentId(comment))).await;
            check_notices(&mut view)?;
            if view.editor().is_none() {
                anyhow::bail!("post {post} has no comment #{comment}");
            }
            step(&mut view, &backend, PostMsg::SetEditDraft(content)).await;
            step(&mut view, &backend, PostMsg::SubmitEdit).await;
            check_notices(&mut view)?;
        }
        Command::Delete { post, comment, yes } => {
            let backend = user_backend()?;
            let mut view = open_view(&backend, post).await?;
            step(&mut view, &backend, PostMsg::RequestDelete(CommentId(comment))).await;
            let prompt = match view.delete_confirmation() {
                None => anyhow::bail!("post {post} has no comment #{comment}"),
                Some(d) => d.to_string(),
            };
            if !yes {
                println!("{prompt} Pass --yes to confirm.");
                return Ok(());
            }
            step(&mut view, &backend, PostMsg::ConfirmDelete).await;
            check_notices(&mut view)?;
        }
        Command::Like { post } => {
            let backend = user_backend()?;
            let mut view = open_view(&backend, post).await?;
            step(&mut view, &backend, PostMsg::ToggleLike).await;
            check_notices(&mut view)?;
            let likes = view.likes();
            println!(
                "{} ({} likes)",
                match likes.is_liked {
                    true => "liked",
                    false => "unliked",
                },
                likes.like_count
            );
        }
        Command::CreateUser {
            name,
            password,
            avatar,
        } => {
            let user = admin_backend()?
                .admin_create_user(&NewUser {
                    name,
                    password,
                    avatar,
                })
                .await
                .context("creating user")?;
            println!("{}", user.id.0);
        }
        Command::CreatePost {
            club,
            author,
            content,
        } => {
            let post = admin_backend()?
                .admin_create_post(&NewPost {
                    club_id: ClubId(club),
                    author_id: UserId(author),
                    content,
                })
                .await
                .context("creating post")?;
            println!("{}", post.id.0);
        }
    }

    Ok(())
}
