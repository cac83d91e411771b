//! Subcommand handlers over `client_core`.

use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, bail, Result};
use client_core::{
    auth::session_from_redirect, editor::parse_meanings, AuthClient, AuthError, FetchOutcome,
    ListError, ListMode, MajorCategoryManager, PostgrestStore, Session, SessionStore, SignUpOutcome,
    WordDraft, WordEditor, WordListController,
};
use shared::{
    domain::{CategoryTable, MajorId, UserId, WordId, WordRecord},
    protocol::WordPatch,
};
use tracing::{info, warn};

use crate::{config::Settings, session_file};

pub struct ListArgs {
    pub table: CategoryTable,
    pub subject: Option<String>,
    pub page: u32,
    pub query: String,
    pub mode: ListMode,
    pub json: bool,
}

pub struct EditArgs {
    pub word: Option<String>,
    pub meanings: Option<String>,
    pub comment: Option<Option<String>>,
    pub major: Option<String>,
    pub category: Option<String>,
}

impl EditArgs {
    fn into_patch(self) -> WordPatch {
        WordPatch {
            word_en: self.word,
            word_kr: self.meanings.as_deref().map(parse_meanings),
            comment: self.comment,
            major_name: self.major.map(Some),
            category: self.category.map(Some),
            ..WordPatch::default()
        }
    }
}

/// Store rejections are reported with the backend's error code and details.
fn list_failure(err: ListError) -> anyhow::Error {
    match err {
        ListError::Store(err) => anyhow::Error::new(err.into_exception()),
        other => anyhow::Error::new(other),
    }
}

fn auth_failure(err: AuthError) -> anyhow::Error {
    let message = err.localized();
    anyhow::Error::new(err).context(message)
}

pub struct App {
    settings: Settings,
    auth: AuthClient,
    sessions: Arc<SessionStore>,
    session_path: PathBuf,
    store: Arc<PostgrestStore>,
}

impl App {
    pub fn open(settings: Settings) -> Result<Self> {
        let config = settings.baas_config()?;
        let session_path = settings.session_path()?;
        let saved = session_file::load(&session_path)?;
        let sessions = Arc::new(SessionStore::new(saved));
        let store = Arc::new(PostgrestStore::new(config.clone(), sessions.clone()));
        Ok(Self {
            settings,
            auth: AuthClient::new(config),
            sessions,
            session_path,
            store,
        })
    }

    async fn remember(&self, session: Session) -> Result<()> {
        session_file::save(&self.session_path, &session)?;
        info!(user_id = %session.user.id, "session stored");
        self.sessions.set(Some(session)).await;
        Ok(())
    }

    async fn forget(&self) -> Result<Option<Session>> {
        session_file::remove(&self.session_path)?;
        Ok(self.sessions.clear().await)
    }

    /// The signed-in owner, refreshing the session first when it is close to
    /// expiry. A refresh the backend rejects signs the user out.
    async fn owner(&self) -> Result<Option<UserId>> {
        let before = self.sessions.current().await;
        match self.sessions.ensure_fresh(&self.auth).await {
            Ok(Some(session)) => {
                if before.as_ref() != Some(&session) {
                    session_file::save(&self.session_path, &session)?;
                }
                Ok(Some(session.user.id))
            }
            Ok(None) => Ok(None),
            Err(AuthError::Rejected { status, message }) => {
                warn!(status, %message, "session refresh rejected; signing out");
                self.forget().await?;
                Ok(None)
            }
            Err(err) => Err(auth_failure(err)),
        }
    }

    async fn require_owner(&self) -> Result<UserId> {
        self.owner()
            .await?
            .ok_or_else(|| auth_failure(AuthError::NoSession))
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<()> {
        let session = self
            .auth
            .sign_in_with_password(email, password)
            .await
            .map_err(auth_failure)?;
        println!("signed in as {}", display_user(&session));
        self.remember(session).await
    }

    pub async fn signup(&self, email: &str, password: &str) -> Result<()> {
        match self.auth.sign_up(email, password).await.map_err(auth_failure)? {
            SignUpOutcome::SignedIn(session) => {
                println!("signed up as {}", display_user(&session));
                self.remember(session).await
            }
            SignUpOutcome::ConfirmationRequired { .. } => {
                println!("확인 메일을 보냈습니다. 이메일 인증 후 로그인해주세요.");
                Ok(())
            }
        }
    }

    pub fn oauth_url(&self, provider: &str, redirect_to: Option<&str>) -> Result<()> {
        let redirect_to = redirect_to.or(self.settings.redirect_to.as_deref());
        let url = self
            .auth
            .authorize_url(provider, redirect_to)
            .map_err(auth_failure)?;
        println!("{url}");
        Ok(())
    }

    pub async fn oauth_callback(&self, redirect_url: &str) -> Result<()> {
        let session = session_from_redirect(redirect_url).map_err(auth_failure)?;
        println!("signed in as {}", display_user(&session));
        self.remember(session).await
    }

    pub async fn logout(&self) -> Result<()> {
        let Some(session) = self.forget().await? else {
            println!("not signed in");
            return Ok(());
        };
        if let Err(err) = self.auth.sign_out(&session.access_token).await {
            warn!(error = %err, "remote sign-out failed; local session removed anyway");
        }
        println!("signed out");
        Ok(())
    }

    pub async fn whoami(&self) -> Result<()> {
        if self.owner().await?.is_none() {
            println!("not signed in");
            return Ok(());
        }
        let Some(session) = self.sessions.current().await else {
            println!("not signed in");
            return Ok(());
        };
        println!("user:     {}", session.user.id);
        if let Some(email) = &session.user.email {
            println!("email:    {email}");
        }
        if let Some(provider) = &session.user.provider {
            println!("provider: {provider}");
        }
        println!("expires:  {}", session.expires_at.to_rfc3339());
        Ok(())
    }

    pub async fn list(&self, args: ListArgs) -> Result<()> {
        let owner = self.require_owner().await?;
        let list = WordListController::new(self.store.clone(), Some(owner), args.mode);

        let mut outcome = match list.set_table(args.table).await {
            Some(outcome) => outcome,
            None => list.refresh().await,
        };
        if args.subject.is_some() {
            outcome = list
                .set_subject_filter(args.subject)
                .await
                .map_err(list_failure)?;
        }
        if args.page > 1 {
            outcome = list.set_page(args.page).await;
        }

        match outcome {
            FetchOutcome::Loaded { .. } => {}
            FetchOutcome::Failed { message } => bail!(ListError::FetchFailed { message }),
            FetchOutcome::NotAuthenticated => return Err(auth_failure(AuthError::NoSession)),
            FetchOutcome::Superseded => bail!("list request was superseded"),
        }

        let rows = list.visible_page(&args.query).await;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&rows)?);
            return Ok(());
        }

        let snapshot = list.snapshot().await;
        println!(
            "{} · {}개 · {}/{} 페이지",
            snapshot.table.label(),
            snapshot.total_count,
            snapshot.page,
            snapshot.total_pages().max(1)
        );
        if rows.is_empty() {
            println!("(단어가 없습니다)");
        }
        for row in &rows {
            print_word(row);
        }

        let window = snapshot.page_window();
        if window.is_visible() {
            let mut line = Vec::new();
            if let Some(back) = window.jump_back {
                line.push(format!("…{back}"));
            }
            for page in window.pages() {
                if page == window.current {
                    line.push(format!("[{page}]"));
                } else {
                    line.push(page.to_string());
                }
            }
            if let Some(forward) = window.jump_forward {
                line.push(format!("{forward}…"));
            }
            println!("{}", line.join(" "));
        }
        Ok(())
    }

    fn editor(&self, owner: UserId) -> WordEditor {
        WordEditor::new(self.store.clone(), Some(owner))
    }

    pub async fn add(&self, draft: WordDraft) -> Result<()> {
        let owner = self.require_owner().await?;
        let (record, _) = self
            .editor(owner)
            .upload(&draft)
            .await
            .map_err(list_failure)?;
        println!("added {}", record.id);
        Ok(())
    }

    pub async fn set_checked(&self, table: CategoryTable, id: WordId, checked: bool) -> Result<()> {
        let owner = self.require_owner().await?;
        self.editor(owner)
            .set_checked(table, id, checked)
            .await
            .map_err(list_failure)?;
        println!("{} {id}", if checked { "checked" } else { "unchecked" });
        Ok(())
    }

    pub async fn edit(&self, table: CategoryTable, id: WordId, args: EditArgs) -> Result<()> {
        let owner = self.require_owner().await?;
        if args.major.is_some() && !table.supports_subjects() {
            return Err(anyhow!("{table} rows have no subject"));
        }
        self.editor(owner)
            .update(table, id, args.into_patch())
            .await
            .map_err(list_failure)?;
        println!("updated {id}");
        Ok(())
    }

    pub async fn delete(&self, table: CategoryTable, id: WordId) -> Result<()> {
        let owner = self.require_owner().await?;
        self.editor(owner)
            .delete(table, id)
            .await
            .map_err(list_failure)?;
        println!("deleted {id}");
        Ok(())
    }

    async fn majors(&self) -> Result<MajorCategoryManager> {
        let owner = self.require_owner().await?;
        Ok(MajorCategoryManager::new(self.store.clone(), Some(owner)))
    }

    pub async fn list_majors(&self) -> Result<()> {
        for major in self.majors().await?.list().await.map_err(list_failure)? {
            println!("{}  {}", major.id, major.major_name);
        }
        Ok(())
    }

    pub async fn add_major(&self, name: &str) -> Result<()> {
        let major = self
            .majors()
            .await?
            .add(name)
            .await
            .map_err(list_failure)?;
        println!("added {}  {}", major.id, major.major_name);
        Ok(())
    }

    pub async fn rename_major(&self, id: MajorId, name: &str) -> Result<()> {
        self.majors()
            .await?
            .rename(id, name)
            .await
            .map_err(list_failure)?;
        println!("renamed {id}");
        Ok(())
    }

    pub async fn delete_major(&self, id: MajorId) -> Result<()> {
        self.majors()
            .await?
            .delete(id)
            .await
            .map_err(list_failure)?;
        println!("deleted {id}");
        Ok(())
    }
}

fn display_user(session: &Session) -> String {
    session
        .user
        .email
        .clone()
        .unwrap_or_else(|| session.user.id.to_string())
}

fn print_word(row: &WordRecord) {
    let mut line = format!("{}  {:<24} {}", row.id, row.word_en, row.joined_meanings());
    if let Some(major) = &row.major_name {
        line.push_str(&format!("  [{major}]"));
    }
    if row.is_checked {
        line.push_str("  ✓");
    }
    println!("{line}");
    if let Some(comment) = &row.comment {
        println!("    {comment}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edit_args_build_sparse_patch() {
        let patch = EditArgs {
            word: None,
            meanings: Some("구성하다, 포함하다".into()),
            comment: Some(None),
            major: None,
            category: None,
        }
        .into_patch();
        assert_eq!(
            patch.word_kr,
            Some(vec!["구성하다".to_string(), "포함하다".to_string()])
        );
        assert_eq!(patch.comment, Some(None));
        assert_eq!(patch.word_en, None);
        assert_eq!(patch.major_name, None);
        assert_eq!(patch.category, None);
        assert_eq!(patch.is_checked, None);
    }

    #[test]
    fn empty_edit_is_empty_patch() {
        let patch = EditArgs {
            word: None,
            meanings: None,
            comment: None,
            major: None,
            category: None,
        }
        .into_patch();
        assert!(patch.is_empty());
    }

    #[test]
    fn category_flag_sets_category() {
        let patch = EditArgs {
            word: None,
            meanings: None,
            comment: None,
            major: None,
            category: Some("동사".into()),
        }
        .into_patch();
        assert_eq!(patch.category, Some(Some("동사".to_string())));
        assert!(!patch.is_empty());
    }
}
