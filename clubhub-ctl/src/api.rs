use anyhow::Context;
use async_trait::async_trait;
use clubhub_client::{
    api::{
        self, AuthToken, ClubId, Comment, CommentId, EditComment, Envelope, FeedMessage,
        LikeStatus, LikeToggled, NewComment, Post, PostId, UserId,
    },
    Backend, Error, PushChannel,
};
use reqwest::Method;

/// `Backend` and `PushChannel` over the REST routes of a clubhub server
pub struct HttpBackend {
    client: reqwest::Client,
    host: String,
    token: AuthToken,
    club: Option<ClubId>,
}

async fn unwrap_response<R>(resp: reqwest::Response) -> Result<Envelope<R>, Error>
where
    R: for<'de> serde::Deserialize<'de>,
{
    let status = resp.status();
    let body = resp.bytes().await.context("reading response body")?;
    if !status.is_success() {
        return Err(match api::Error::parse(&body) {
            Ok(err) => Error::Api(err),
            Err(err) => Error::Anyhow(err.context(format!("server answered {status}"))),
        });
    }
    Ok(serde_json::from_slice(&body).context("parsing response envelope")?)
}

pub async fn auth(host: &str, session: &api::NewSession) -> Result<AuthToken, Error> {
    let resp = reqwest::Client::new()
        .post(format!("{host}/api/auth"))
        .json(session)
        .send()
        .await
        .context("sending auth request")?;
    Ok(unwrap_response(resp).await?.into_result()?)
}

impl HttpBackend {
    pub fn new(host: String, token: AuthToken) -> HttpBackend {
        HttpBackend {
            client: reqwest::Client::new(),
            host,
            token,
            club: None,
        }
    }

    /// Sets the club whose feed edits get rebroadcast to
    pub fn with_club(self, club: ClubId) -> HttpBackend {
        HttpBackend {
            club: Some(club),
            ..self
        }
    }

    async fn request<Req, Resp>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Req>,
    ) -> Result<Envelope<Resp>, Error>
    where
        Req: serde::Serialize,
        Resp: for<'de> serde::Deserialize<'de>,
    {
        let req = self
            .client
            .request(method.clone(), format!("{}/api/{path}", self.host))
            .bearer_auth(self.token.0);
        let req = match body {
            Some(body) => req.json(body),
            None => req,
        };
        tracing::debug!(%method, path, "sending request");
        let resp = req
            .send()
            .await
            .with_context(|| format!("sending {method} request to {path}"))?;
        unwrap_response(resp).await
    }

    async fn get<Resp>(&self, path: &str) -> Result<Resp, Error>
    where
        Resp: for<'de> serde::Deserialize<'de>,
    {
        Ok(self
            .request::<(), Resp>(Method::GET, path, None)
            .await?
            .into_result()?)
    }

    pub async fn whoami(&self) -> Result<UserId, Error> {
        self.get("whoami").await
    }

    pub async fn fetch_post(&self, post: PostId) -> Result<Post, Error> {
        self.get(&format!("posts/{}", post.0)).await
    }

    pub async fn admin_create_user(&self, u: &api::NewUser) -> Result<api::User, Error> {
        Ok(self
            .request(Method::POST, "admin/create-user", Some(u))
            .await?
            .into_result()?)
    }

    pub async fn admin_create_post(&self, p: &api::NewPost) -> Result<Post, Error> {
        Ok(self
            .request(Method::POST, "admin/create-post", Some(p))
            .await?
            .into_result()?)
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn list_comments(&self, post: PostId) -> Result<Vec<Comment>, Error> {
        self.get(&format!("posts/{}/comments", post.0)).await
    }

    async fn create_comment(&self, comment: NewComment) -> Result<Comment, Error> {
        let path = format!("posts/{}/comments", comment.post_id.0);
        Ok(self
            .request(Method::POST, &path, Some(&comment))
            .await?
            .into_result()?)
    }

    async fn edit_comment(&self, id: CommentId, edit: EditComment) -> Result<Comment, Error> {
        Ok(self
            .request(Method::PUT, &format!("comments/{}", id.0), Some(&edit))
            .await?
            .into_result()?)
    }

    async fn delete_comment(&self, id: CommentId) -> Result<(), Error> {
        Ok(self
            .request::<(), ()>(Method::DELETE, &format!("comments/{}", id.0), None)
            .await?
            .into_unit()?)
    }

    async fn toggle_like(&self, post: PostId) -> Result<LikeToggled, Error> {
        Ok(self
            .request::<(), _>(Method::POST, &format!("posts/{}/like", post.0), None)
            .await?
            .into_result()?)
    }

    async fn like_status(&self, post: PostId) -> Result<LikeStatus, Error> {
        self.get(&format!("posts/{}/like", post.0)).await
    }
}

#[async_trait]
impl PushChannel for HttpBackend {
    async fn send(&self, msg: FeedMessage) -> Result<(), Error> {
        let club = self
            .club
            .context("publishing a feed message without knowing the club")?;
        Ok(self
            .request::<_, ()>(
                Method::POST,
                &format!("clubs/{}/publish", club.0),
                Some(&msg),
            )
            .await?
            .into_unit()?)
    }
}
