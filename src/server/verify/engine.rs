//! Per-guild verification runs.

use chrono::{DateTime, Utc};
use rand::seq::IndexedRandom;
use serenity::all::CreateMessage;
use std::collections::HashSet;
use std::time::Duration;

use super::{
    diff::{merge_diff, MergeDiff},
    embed::{self, RunSummary},
    is_due,
    patch::RolePatch,
    Finish, VerifyState,
};
use crate::server::{
    data::{
        guild_member::GuildMemberRepository, server::ServerRepository,
        torn_key::TornKeyRepository, user::UserRepository,
    },
    error::{verify::VerifyError, AppError},
    gateway::{ErrorKind, Method},
    model::{
        member::{MemberPage, MemberSnapshot},
        server::Server,
    },
    service::profile::{Lookup, ProfileService},
    state::AppState,
    store::{keys, Expiry},
    task::{retry::backoff, Task, TaskEnvelope, TaskError},
};

/// Stored profiles older than this are looked up again.
const PROFILE_MAX_AGE: chrono::Duration = chrono::Duration::days(7);

/// What happened to one member.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciled {
    /// A patch call was queued.
    Patched,
    /// Nothing to change.
    Unchanged,
    /// Not verifiable now; logged and left alone.
    Skipped,
    /// The profile lookup has to wait.
    Deferred(ErrorKind),
}

/// Outcome of one page, for logging and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct PageReport {
    pub state: VerifyState,
    pub diff: MergeDiff,
    pub patched: usize,
    pub deferred: usize,
}

pub struct VerifyEngine<'a> {
    state: &'a AppState,
}

impl<'a> VerifyEngine<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Queues the first page of every auto-verifying guild due in the slot of `now`.
    ///
    /// # Returns
    /// - `Ok(usize)` - Number of guild runs queued
    /// - `Err(TaskError)` - Database or store failure
    pub async fn fan_out(&self, now: DateTime<Utc>) -> Result<usize, TaskError> {
        let guild_ids = ServerRepository::new(&self.state.db)
            .auto_verify_guild_ids()
            .await?;

        let mut queued = 0;
        for guild_id in guild_ids
            .into_iter()
            .filter(|&id| is_due(id, now.timestamp()))
        {
            self.state
                .queue
                .push(Task::VerifyGuild {
                    guild_id,
                    cursor: 0,
                    force: false,
                })
                .await?;
            queued += 1;
        }

        if queued > 0 {
            tracing::info!("Queued scheduled verification for {} guild(s)", queued);
        }

        Ok(queued)
    }

    /// Processes one page of a guild run, starting after `cursor`.
    ///
    /// Cursor 0 starts a run: it takes the per-guild lock, resets the run's progress
    /// counters and posts a start summary. A retried first page keeps the summary it
    /// already posted. Later pages renew the lock. The page is merge-diffed against the
    /// internal member ids in the same id range, and every member that needs it is
    /// reconciled. The run then either queues its next page or finishes.
    ///
    /// A failure that cannot be retried ends the run and releases its lock.
    ///
    /// # Arguments
    /// - `guild_id` - Guild to verify
    /// - `cursor` - Highest member id already processed, 0 for a new run
    /// - `force` - Look up every member's profile, even fresh ones
    ///
    /// # Returns
    /// - `Ok(PageReport)` - The page was processed
    /// - `Err(TaskError::App(AppError::VerifyErr))` - The run was refused
    /// - `Err(TaskError::Gateway)` - The member page could not be fetched
    pub async fn run_page(
        &self,
        guild_id: i64,
        cursor: i64,
        force: bool,
    ) -> Result<PageReport, TaskError> {
        let (server, keys) = self.preflight(guild_id).await?;

        let result = if cursor == 0 {
            self.acquire_lock(guild_id).await?;
            match self.start(&server, keys.len()).await {
                Ok(()) => self.scan(&server, &keys, cursor, force).await,
                Err(e) => Err(e),
            }
        } else {
            if !self
                .state
                .store
                .expire(&keys::verify_lock(guild_id), self.state.verify.lock_ttl)
                .await?
            {
                self.acquire_lock(guild_id).await?;
            }
            self.scan(&server, &keys, cursor, force).await
        };

        if let Err(e) = &result {
            self.release(guild_id, cursor, e).await;
        }
        result
    }

    /// Releases what a failed page holds.
    ///
    /// A retried first page takes the lock again, so it is dropped; later pages keep it
    /// for their retry. A failure that ends the run also clears the start marker.
    async fn release(&self, guild_id: i64, cursor: i64, error: &TaskError) {
        let mut stale = Vec::new();
        if cursor == 0 || !error.is_retryable() {
            stale.push(keys::verify_lock(guild_id));
        }
        if !error.is_retryable() {
            stale.push(keys::verify_started(guild_id));
        }
        if stale.is_empty() {
            return;
        }

        if let Err(e) = self.state.store.delete(&stale).await {
            tracing::warn!("Failed to release verification lock of guild {}: {}", guild_id, e);
        }
    }

    /// Verifies a single member outside of a paged run.
    ///
    /// # Arguments
    /// - `guild_id` - Guild the member belongs to
    /// - `member` - The member's current state
    /// - `force` - Look the profile up even if the stored one is fresh
    /// - `joined` - The member just joined; failures are also posted to the jail channel
    ///
    /// # Returns
    /// - `Ok(Reconciled)` - What was done
    /// - `Err(TaskError::Gateway)` - The lookup was rate limited or failed transiently
    pub async fn verify_member(
        &self,
        guild_id: i64,
        member: &MemberSnapshot,
        force: bool,
        joined: bool,
    ) -> Result<Reconciled, TaskError> {
        let (server, keys) = self.preflight(guild_id).await?;
        if member.automated || server.is_excluded(&member.roles) {
            return Ok(Reconciled::Skipped);
        }

        let reconciled = self
            .reconcile(&server, &keys, member, true, joined, force)
            .await?;
        match reconciled {
            Reconciled::Deferred(kind) if kind.is_retryable(Method::Get) => Err(TaskError::gateway(
                Method::Get,
                format!("user/{}", member.user_id),
                kind,
            )),
            Reconciled::Deferred(kind) => {
                // The key was removed; try again with the remaining ones.
                self.defer_member(guild_id, member, force, joined, &kind, 1)
                    .await?;
                Ok(Reconciled::Deferred(kind))
            }
            Reconciled::Skipped if joined => {
                if let Some(channel) = server.verify_jail_channel {
                    self.post(channel, embed::jail_notice(member.user_id)).await?;
                }
                Ok(Reconciled::Skipped)
            }
            other => Ok(other),
        }
    }

    async fn preflight(&self, guild_id: i64) -> Result<(Server, Vec<String>), TaskError> {
        let server = ServerRepository::new(&self.state.db)
            .find_by_guild_id(guild_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Guild {} is not configured", guild_id)))?;

        if !server.verify_enabled {
            return Err(VerifyError::Disabled(guild_id).into());
        }
        if !server.applies_anything() {
            return Err(VerifyError::NothingToApply(guild_id).into());
        }

        let keys = TornKeyRepository::new(&self.state.db)
            .keys_for_users(&server.admins)
            .await?;
        if keys.is_empty() {
            return Err(VerifyError::NoAdminKeys(guild_id).into());
        }

        Ok((server, keys))
    }

    async fn acquire_lock(&self, guild_id: i64) -> Result<(), TaskError> {
        let lock = keys::verify_lock(guild_id);
        let acquired = self
            .state
            .store
            .set_nx(&lock, "1", Expiry::After(self.state.verify.lock_ttl))
            .await?;
        if acquired {
            return Ok(());
        }

        let retry_in = self
            .state
            .store
            .ttl(&lock)
            .await?
            .map(|ttl| ttl.as_secs())
            .unwrap_or_default();
        Err(VerifyError::AlreadyRunning { guild_id, retry_in }.into())
    }

    async fn start(&self, server: &Server, key_count: usize) -> Result<(), TaskError> {
        let store = &self.state.store;
        let ttl = self.state.verify.lock_ttl;
        let started = keys::verify_started(server.guild_id);
        if store.get(&started).await?.is_some() {
            tracing::debug!("Retrying first page of guild {}", server.guild_id);
            return Ok(());
        }
        store.delete(&keys::verify_progress(server.guild_id)).await?;

        let route = format!("guilds/{}?with_counts=true", server.guild_id);
        let guild = self
            .state
            .gateway
            .call(Method::Get, &route, &self.state.bot, None)
            .await
            .map_err(|kind| TaskError::gateway(Method::Get, route.as_str(), kind))?;
        let approximate = guild
            .as_ref()
            .and_then(|g| g.get("approximate_member_count"))
            .and_then(|count| count.as_i64())
            .unwrap_or_default();

        store
            .set(
                &keys::verify_approximate(server.guild_id),
                &approximate.to_string(),
                Expiry::After(ttl),
            )
            .await?;

        tracing::info!(
            "Starting verification of guild {} ({} keys, ~{} members)",
            server.guild_id,
            key_count,
            approximate
        );
        self.log(server, embed::run_started(&server.name, key_count, approximate))
            .await?;
        store.set(&started, "1", Expiry::After(ttl)).await?;
        Ok(())
    }

    async fn scan(
        &self,
        server: &Server,
        keys: &[String],
        cursor: i64,
        force: bool,
    ) -> Result<PageReport, TaskError> {
        let guild_id = server.guild_id;
        let store = &self.state.store;
        let settings = &self.state.verify;
        tracing::debug!("{:?} guild {}", VerifyState::Scanning { cursor }, guild_id);

        let page_size = settings.page_size(keys.len());
        let route = format!(
            "guilds/{}/members?limit={}&after={}",
            guild_id, page_size, cursor
        );
        let page = match self.fetch_page(&route).await {
            Ok(page) => page,
            Err(kind) => {
                if !kind.is_retryable(Method::Get) {
                    tracing::warn!(
                        "Stopping verification of guild {}: member page after {} failed: {}",
                        guild_id,
                        cursor,
                        kind
                    );
                    self.log(server, embed::page_fetch_failed(&kind)).await?;
                }
                return Err(TaskError::gateway(Method::Get, route, kind));
            }
        };
        let members = page.members;

        let runs = store
            .incr(&keys::verify_runs(guild_id), 1, settings.lock_ttl)
            .await?;
        let attempted = store
            .incr(
                &keys::verify_member_count(guild_id),
                members.len() as i64,
                settings.lock_ttl,
            )
            .await?;

        let page_max = members.last().map(|m| m.user_id).unwrap_or(cursor);
        let remote: Vec<i64> = members.iter().map(|m| m.user_id).collect();
        let internal = GuildMemberRepository::new(&self.state.db)
            .user_ids_in_range(guild_id, cursor, page_max)
            .await?;
        let diff = merge_diff(&remote, &internal)?;

        tracing::debug!("{:?} guild {}", VerifyState::Reconciling, guild_id);
        let remote_only: HashSet<i64> = diff.remote_only.iter().copied().collect();
        let (mut patched, mut deferred) = (0, 0);
        for member in &members {
            if member.automated || server.is_excluded(&member.roles) {
                continue;
            }

            let is_new = remote_only.contains(&member.user_id);
            match self
                .reconcile(server, keys, member, is_new, false, force)
                .await?
            {
                Reconciled::Patched => patched += 1,
                Reconciled::Deferred(kind) => {
                    deferred += 1;
                    self.defer_member(guild_id, member, force, false, &kind, deferred)
                        .await?;
                }
                Reconciled::Unchanged | Reconciled::Skipped => {}
            }
        }

        if !diff.internal_only.is_empty() {
            let absent: Vec<String> = diff.internal_only.iter().map(|id| id.to_string()).collect();
            store
                .set_add(&keys::verify_absent(guild_id), &absent, settings.lock_ttl)
                .await?;
        }

        let approximate: i64 = store
            .get(&keys::verify_approximate(guild_id))
            .await?
            .and_then(|value| value.parse().ok())
            .unwrap_or_default();
        let finish = if (page.raw_len as u64) < u64::from(page_size) {
            Some(Finish::Exhausted)
        } else if approximate > 0 && attempted as f64 > approximate as f64 * settings.convergence
        {
            Some(Finish::Converged)
        } else if runs >= i64::from(settings.max_pages) {
            Some(Finish::PageBudget)
        } else {
            None
        };

        let state = match finish {
            Some(finish) => {
                let summary = RunSummary {
                    finish,
                    approximate_members: approximate,
                    attempted,
                    pages: runs,
                    removed: 0,
                };
                self.finish(server, page_max, summary).await?;
                VerifyState::Done(finish)
            }
            None => {
                let next = TaskEnvelope::new(Task::VerifyGuild {
                    guild_id,
                    cursor: page_max,
                    force,
                });
                self.state.queue.enqueue(&next, settings.page_delay).await?;
                VerifyState::Rescheduled { cursor: page_max }
            }
        };

        tracing::info!(
            "Verification page of guild {} after {}: {} matched, {} new, {} absent, {} patched, {} deferred; {:?}",
            guild_id,
            cursor,
            diff.matched.len(),
            diff.remote_only.len(),
            diff.internal_only.len(),
            patched,
            deferred,
            state
        );

        Ok(PageReport {
            state,
            diff,
            patched,
            deferred,
        })
    }

    /// Removes confirmed-absent members, posts the summary and releases the run.
    ///
    /// Absent candidates are confirmed when the scan converged or ran out of members.
    /// An exhausted scan also confirms every internal id above the last page. A run
    /// stopped by the page budget confirms nothing.
    async fn finish(
        &self,
        server: &Server,
        last_id: i64,
        mut summary: RunSummary,
    ) -> Result<(), TaskError> {
        let guild_id = server.guild_id;
        let store = &self.state.store;
        let members = GuildMemberRepository::new(&self.state.db);

        let mut absent: Vec<i64> = match summary.finish {
            Finish::PageBudget => Vec::new(),
            Finish::Exhausted | Finish::Converged => store
                .set_members(&keys::verify_absent(guild_id))
                .await?
                .iter()
                .filter_map(|id| id.parse().ok())
                .collect(),
        };
        if summary.finish == Finish::Exhausted {
            absent.extend(members.user_ids_after(guild_id, last_id).await?);
        }
        summary.removed = members.delete_many(guild_id, &absent).await?;

        self.log(server, embed::run_finished(&server.name, &summary))
            .await?;

        let mut run_keys = keys::verify_progress(guild_id);
        run_keys.push(keys::verify_started(guild_id));
        run_keys.push(keys::verify_lock(guild_id));
        store.delete(&run_keys).await?;

        tracing::info!(
            "Finished verification of guild {} ({:?}): {} attempted over {} pages, {} removed",
            guild_id,
            summary.finish,
            summary.attempted,
            summary.pages,
            summary.removed
        );

        Ok(())
    }

    /// Brings one member in line with their profile.
    ///
    /// Uses the stored profile when it is fresh and `force` is off, and looks it up with a
    /// random admin key otherwise. `record` marks members that are not yet in the internal
    /// list; they are recorded once their patch succeeds. `welcome` posts a completion
    /// notice to the jail channel after the patch.
    async fn reconcile(
        &self,
        server: &Server,
        keys: &[String],
        member: &MemberSnapshot,
        record: bool,
        welcome: bool,
        force: bool,
    ) -> Result<Reconciled, TaskError> {
        let stored = UserRepository::new(&self.state.db)
            .find_by_discord_id(member.user_id)
            .await?;

        let profile = match stored {
            Some(profile) if !force && !profile.is_stale(Utc::now(), PROFILE_MAX_AGE) => profile,
            _ => {
                let Some(key) = keys.choose(&mut rand::rng()).cloned() else {
                    return Err(VerifyError::NoAdminKeys(server.guild_id).into());
                };

                match ProfileService::new(&self.state.db, &self.state.gateway)
                    .lookup(member.user_id, &key)
                    .await?
                {
                    Lookup::Found(profile) => profile,
                    Lookup::Unknown => {
                        tracing::debug!(
                            "Member {} of guild {} is not linked to a game account",
                            member.user_id,
                            server.guild_id
                        );
                        self.log(server, embed::lookup_failed(member.user_id)).await?;
                        return Ok(Reconciled::Skipped);
                    }
                    Lookup::Deferred(kind) => return Ok(Reconciled::Deferred(kind)),
                    Lookup::Failed(kind) => {
                        tracing::warn!(
                            "Skipping member {} of guild {}: profile lookup failed: {}",
                            member.user_id,
                            server.guild_id,
                            kind
                        );
                        return Ok(Reconciled::Skipped);
                    }
                }
            }
        };

        let patch = RolePatch::compute(server, &profile, member);
        let members = GuildMemberRepository::new(&self.state.db);

        if patch.is_empty() {
            if record {
                members.insert(server.guild_id, member.user_id).await?;
            }
            return Ok(Reconciled::Unchanged);
        }

        let mut after_patch = Vec::new();
        if record {
            after_patch.push(Task::RecordMember {
                guild_id: server.guild_id,
                user_id: member.user_id,
            });
        }
        if let Some(channel) = server.verify_jail_channel.filter(|_| welcome) {
            after_patch.push(Task::DiscordCall {
                method: Method::Post,
                route: format!("channels/{}/messages", channel),
                payload: Some(serde_json::to_value(embed::verification_complete(
                    &server.name,
                    member.user_id,
                ))?),
            });
        }

        let follow_up = after_patch.into_iter().rev().fold(None, |next, task| {
            let envelope = TaskEnvelope::new(task);
            Some(match next {
                Some(next) => envelope.then(next),
                None => envelope,
            })
        });
        let mut call = TaskEnvelope::new(Task::DiscordCall {
            method: Method::Patch,
            route: format!("guilds/{}/members/{}", server.guild_id, member.user_id),
            payload: Some(patch.to_payload()),
        });
        if let Some(next) = follow_up {
            call = call.then(next);
        }
        self.state.queue.enqueue(&call, Duration::ZERO).await?;
        self.log(server, embed::verification_attempted(member, &patch))
            .await?;

        Ok(Reconciled::Patched)
    }

    /// Fetches and decodes one member-list page.
    async fn fetch_page(&self, route: &str) -> Result<MemberPage, ErrorKind> {
        let body = self
            .state
            .gateway
            .call(Method::Get, route, &self.state.bot, None)
            .await?
            .ok_or_else(|| ErrorKind::Decode("empty member page".to_string()))?;

        MemberSnapshot::page_from_json(&body).map_err(ErrorKind::Decode)
    }

    /// Queues a single-member verification after a lookup had to wait.
    ///
    /// `position` spreads deferrals from one page over time.
    async fn defer_member(
        &self,
        guild_id: i64,
        member: &MemberSnapshot,
        force: bool,
        joined: bool,
        kind: &ErrorKind,
        position: usize,
    ) -> Result<(), TaskError> {
        let spread = Duration::from_millis(100 * position as u64);
        let countdown = backoff(1, &mut rand::rng())
            .max(kind.retry_after().unwrap_or_default())
            + spread;
        let envelope = TaskEnvelope::new(Task::VerifyMember {
            guild_id,
            member: member.clone(),
            force,
            joined,
        })
        .expires_in(chrono::Duration::seconds(
            self.state.verify.lock_ttl.as_secs() as i64,
        ));

        self.state.queue.enqueue(&envelope, countdown).await?;
        Ok(())
    }

    async fn log(&self, server: &Server, message: CreateMessage) -> Result<(), TaskError> {
        match server.verify_log_channel {
            Some(channel) => self.post(channel, message).await,
            None => Ok(()),
        }
    }

    async fn post(&self, channel_id: i64, message: CreateMessage) -> Result<(), TaskError> {
        let payload = serde_json::to_value(message)?;
        self.state
            .queue
            .push(Task::DiscordCall {
                method: Method::Post,
                route: format!("channels/{}/messages", channel_id),
                payload: Some(payload),
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::{
        gateway::transport::{
            mock::{json_response, ScriptedTransport},
            HttpRequest, HttpResponse, TransportError,
        },
        state::test::state_with,
        verify::VerifySettings,
    };
    use serde_json::{json, Value};
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };
    use test_utils::{context::TestContext, factory};

    const VERIFIED_ROLE: i64 = 7;

    fn member_json(id: i64) -> Value {
        json!({"user": {"id": id.to_string(), "username": format!("user{id}")}, "roles": [], "nick": null})
    }

    /// Answers guild, member-page and profile requests for a guild whose remote members
    /// are `pages`, fetched two at a time.
    fn responder(
        approximate: i64,
        pages: Vec<Vec<i64>>,
    ) -> impl Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync {
        move |request| {
            let url = request.url.as_str();
            if url.contains("torn.test/user/") {
                let discord_id: i64 = url
                    .split("user/")
                    .nth(1)
                    .and_then(|rest| rest.split('?').next())
                    .and_then(|id| id.parse().ok())
                    .unwrap_or_default();
                return Ok(json_response(
                    200,
                    json!({
                        "player_id": discord_id * 1000,
                        "name": format!("P{discord_id}"),
                        "discord": {"discordID": discord_id.to_string()},
                    }),
                    &[],
                ));
            }
            if url.contains("/members?") {
                let after: i64 = url
                    .split("after=")
                    .nth(1)
                    .and_then(|a| a.parse().ok())
                    .unwrap_or_default();
                let page = pages
                    .iter()
                    .find(|page| page.first().is_some_and(|first| *first > after))
                    .cloned()
                    .unwrap_or_default();
                let body: Vec<Value> = page.into_iter().map(member_json).collect();
                return Ok(json_response(200, Value::Array(body), &[]));
            }
            Ok(json_response(
                200,
                json!({"id": "1", "approximate_member_count": approximate}),
                &[],
            ))
        }
    }

    fn settings() -> VerifySettings {
        VerifySettings {
            page_size_per_key: 2,
            ..VerifySettings::default()
        }
    }

    async fn setup(
        approximate: i64,
        pages: Vec<Vec<i64>>,
        internal: &[i64],
    ) -> (TestContext, AppState, i64) {
        let transport = Arc::new(ScriptedTransport::new(responder(approximate, pages)));
        setup_with(transport, internal).await
    }

    async fn setup_with(
        transport: Arc<ScriptedTransport>,
        internal: &[i64],
    ) -> (TestContext, AppState, i64) {
        let (test, state) = state_with(transport, settings()).await;
        let db = test.db.as_ref().unwrap();

        let admin = factory::create_user(db).await.unwrap();
        factory::create_torn_key(db, admin.tid).await.unwrap();
        let server = factory::server::ServerFactory::new(db)
            .admins(vec![admin.tid])
            .verify_enabled(true)
            .verify_template("")
            .verified_roles(vec![VERIFIED_ROLE])
            .verify_log_channel(555)
            .build()
            .await
            .unwrap();
        for &user_id in internal {
            factory::create_guild_member(db, server.guild_id, user_id)
                .await
                .unwrap();
        }

        (test, state, server.guild_id)
    }

    /// Every queued task, followed by the tasks linked to run after it.
    async fn drain(state: &AppState) -> Vec<Task> {
        let mut tasks = Vec::new();
        while let Some(envelope) = state.queue.pop_due().await.unwrap() {
            let mut next = Some(envelope);
            while let Some(envelope) = next {
                tasks.push(envelope.task);
                next = envelope.link.map(|link| *link);
            }
        }
        tasks
    }

    /// Titles of the embeds posted to `channel`, in queue order.
    fn posted_titles(tasks: &[Task], channel: i64) -> Vec<String> {
        let route = format!("channels/{channel}/messages");
        tasks
            .iter()
            .filter_map(|task| match task {
                Task::DiscordCall {
                    method: Method::Post,
                    route: posted,
                    payload: Some(payload),
                } if *posted == route => payload["embeds"][0]["title"].as_str().map(str::to_string),
                _ => None,
            })
            .collect()
    }

    fn patched_members(tasks: &[Task]) -> Vec<String> {
        let mut routes: Vec<String> = tasks
            .iter()
            .filter_map(|task| match task {
                Task::DiscordCall {
                    method: Method::Patch,
                    route,
                    ..
                } => Some(route.clone()),
                _ => None,
            })
            .collect();
        routes.sort();
        routes
    }

    #[tokio::test]
    async fn two_page_run_converges_and_removes_absent_member() {
        let (test, state, guild_id) = setup(4, vec![vec![10, 25], vec![30, 40]], &[10, 20, 30]).await;
        let db = test.db.as_ref().unwrap();
        for discord_id in [10, 30] {
            factory::user::UserFactory::new(db)
                .discord_id(discord_id)
                .build()
                .await
                .unwrap();
        }
        let engine = VerifyEngine::new(&state);

        let first = engine.run_page(guild_id, 0, false).await.unwrap();

        assert_eq!(first.state, VerifyState::Rescheduled { cursor: 25 });
        assert_eq!(first.diff.matched, vec![10]);
        assert_eq!(first.diff.remote_only, vec![25]);
        assert_eq!(first.diff.internal_only, vec![20]);
        let tasks = drain(&state).await;
        assert_eq!(
            patched_members(&tasks),
            vec![
                format!("guilds/{guild_id}/members/10"),
                format!("guilds/{guild_id}/members/25"),
            ]
        );
        assert!(tasks.contains(&Task::RecordMember {
            guild_id,
            user_id: 25
        }));
        assert!(!tasks.contains(&Task::RecordMember {
            guild_id,
            user_id: 10
        }));

        let second = engine.run_page(guild_id, 25, false).await.unwrap();

        assert_eq!(second.state, VerifyState::Done(Finish::Converged));
        assert_eq!(second.diff.matched, vec![30]);
        assert_eq!(second.diff.remote_only, vec![40]);
        let remaining = GuildMemberRepository::new(db)
            .user_ids_after(guild_id, 0)
            .await
            .unwrap();
        assert_eq!(remaining, vec![10, 30]);
        let lock = state.store.get(&keys::verify_lock(guild_id)).await.unwrap();
        assert!(lock.is_none());
    }

    #[tokio::test]
    async fn exhausted_run_removes_members_above_last_page() {
        let (test, state, guild_id) = setup(100, vec![vec![5]], &[5, 500]).await;
        let db = test.db.as_ref().unwrap();
        factory::user::UserFactory::new(db)
            .discord_id(5)
            .build()
            .await
            .unwrap();

        let report = VerifyEngine::new(&state)
            .run_page(guild_id, 0, false)
            .await
            .unwrap();

        assert_eq!(report.state, VerifyState::Done(Finish::Exhausted));
        let remaining = GuildMemberRepository::new(db)
            .user_ids_after(guild_id, 0)
            .await
            .unwrap();
        assert_eq!(remaining, vec![5]);
    }

    #[tokio::test]
    async fn page_budget_keeps_absent_candidates() {
        let (_test, mut state, guild_id) =
            setup(1000, vec![vec![10, 25], vec![30, 40]], &[20]).await;
        state.verify.max_pages = 1;

        let report = VerifyEngine::new(&state)
            .run_page(guild_id, 0, false)
            .await
            .unwrap();

        assert_eq!(report.state, VerifyState::Done(Finish::PageBudget));
        let remaining = GuildMemberRepository::new(&state.db)
            .user_ids_after(guild_id, 0)
            .await
            .unwrap();
        assert_eq!(remaining, vec![20]);
    }

    #[tokio::test]
    async fn second_run_is_refused_while_locked() {
        let (_test, state, guild_id) = setup(100, vec![vec![10, 25], vec![30, 40]], &[]).await;
        let engine = VerifyEngine::new(&state);

        engine.run_page(guild_id, 0, false).await.unwrap();
        let second = engine.run_page(guild_id, 0, false).await;

        assert!(matches!(
            second,
            Err(TaskError::App(AppError::VerifyErr(
                VerifyError::AlreadyRunning { .. }
            )))
        ));
    }

    #[tokio::test]
    async fn run_without_admin_keys_is_refused() {
        let transport = Arc::new(ScriptedTransport::new(responder(1, vec![])));
        let (test, state) = state_with(transport.clone(), settings()).await;
        let server = factory::server::ServerFactory::new(test.db.as_ref().unwrap())
            .verify_enabled(true)
            .build()
            .await
            .unwrap();

        let result = VerifyEngine::new(&state)
            .run_page(server.guild_id, 0, false)
            .await;

        assert!(matches!(
            result,
            Err(TaskError::App(AppError::VerifyErr(VerifyError::NoAdminKeys(_))))
        ));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn start_posts_summary_to_log_channel() {
        let (_test, state, guild_id) = setup(100, vec![vec![10, 25], vec![30, 40]], &[]).await;

        VerifyEngine::new(&state)
            .run_page(guild_id, 0, false)
            .await
            .unwrap();

        let titles = posted_titles(&drain(&state).await, 555);
        assert_eq!(
            titles,
            vec![
                "Verification Started",
                "API Verification Attempted",
                "API Verification Attempted",
            ]
        );
    }

    #[tokio::test]
    async fn retried_first_page_posts_one_start_summary() {
        let inner = responder(100, vec![vec![10, 25], vec![30, 40]]);
        let failures = AtomicUsize::new(0);
        let transport = Arc::new(ScriptedTransport::new(move |request| {
            if request.url.contains("/members?") && failures.fetch_add(1, Ordering::SeqCst) < 2 {
                return Err(TransportError::Timeout);
            }
            inner(request)
        }));
        let (_test, state, guild_id) = setup_with(transport, &[]).await;
        let engine = VerifyEngine::new(&state);

        for _ in 0..2 {
            let failed = engine.run_page(guild_id, 0, false).await;
            assert!(matches!(failed, Err(ref e) if e.is_retryable()));
        }
        let report = engine.run_page(guild_id, 0, false).await.unwrap();

        assert_eq!(report.state, VerifyState::Rescheduled { cursor: 25 });
        let titles = posted_titles(&drain(&state).await, 555);
        assert_eq!(
            titles
                .iter()
                .filter(|title| *title == "Verification Started")
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn malformed_page_keeps_stored_members() {
        let transport = Arc::new(ScriptedTransport::new(|request| {
            if request.url.contains("/members?") {
                return Ok(json_response(200, json!({"message": "unexpected"}), &[]));
            }
            Ok(json_response(
                200,
                json!({"id": "1", "approximate_member_count": 3}),
                &[],
            ))
        }));
        let (test, state, guild_id) = setup_with(transport, &[10, 20, 30]).await;

        let result = VerifyEngine::new(&state)
            .run_page(guild_id, 0, false)
            .await;

        assert!(matches!(
            result,
            Err(TaskError::Gateway {
                kind: ErrorKind::Decode(_),
                ..
            })
        ));
        let remaining = GuildMemberRepository::new(test.db.as_ref().unwrap())
            .user_ids_after(guild_id, 0)
            .await
            .unwrap();
        assert_eq!(remaining, vec![10, 20, 30]);
    }

    #[tokio::test]
    async fn rejected_page_is_logged_and_releases_lock() {
        let inner = responder(100, vec![vec![10, 25], vec![30, 40]]);
        let transport = Arc::new(ScriptedTransport::new(move |request| {
            if request.url.contains("after=25") {
                return Ok(json_response(
                    403,
                    json!({"code": 50001, "message": "Missing Access"}),
                    &[],
                ));
            }
            inner(request)
        }));
        let (_test, state, guild_id) = setup_with(transport, &[]).await;
        let engine = VerifyEngine::new(&state);
        engine.run_page(guild_id, 0, false).await.unwrap();
        drain(&state).await;

        let result = engine.run_page(guild_id, 25, false).await;

        assert!(matches!(result, Err(ref e) if !e.is_retryable()));
        assert_eq!(
            posted_titles(&drain(&state).await, 555),
            vec!["Discord API Error"]
        );
        let lock = state.store.get(&keys::verify_lock(guild_id)).await.unwrap();
        assert!(lock.is_none());
        let started = state
            .store
            .get(&keys::verify_started(guild_id))
            .await
            .unwrap();
        assert!(started.is_none());
    }

    #[tokio::test]
    async fn joined_member_is_welcomed_after_patch() {
        let transport = Arc::new(ScriptedTransport::new(responder(1, vec![])));
        let (test, state) = state_with(transport, settings()).await;
        let db = test.db.as_ref().unwrap();
        let admin = factory::create_user(db).await.unwrap();
        factory::create_torn_key(db, admin.tid).await.unwrap();
        let server = factory::server::ServerFactory::new(db)
            .admins(vec![admin.tid])
            .verify_enabled(true)
            .verify_template("")
            .verified_roles(vec![VERIFIED_ROLE])
            .verify_jail_channel(777)
            .build()
            .await
            .unwrap();
        let member = MemberSnapshot {
            user_id: 12,
            roles: vec![],
            nick: None,
            username: "user12".to_string(),
            automated: false,
        };

        let result = VerifyEngine::new(&state)
            .verify_member(server.guild_id, &member, false, true)
            .await
            .unwrap();

        assert_eq!(result, Reconciled::Patched);
        let queued = state.queue.pop_due().await.unwrap().unwrap();
        assert!(matches!(
            queued.task,
            Task::DiscordCall {
                method: Method::Patch,
                ..
            }
        ));
        let record = queued.link.unwrap();
        assert_eq!(
            record.task,
            Task::RecordMember {
                guild_id: server.guild_id,
                user_id: 12
            }
        );
        let welcome = record.link.unwrap();
        assert_eq!(
            posted_titles(&[welcome.task], 777),
            vec!["Verification Complete"]
        );
    }

    #[tokio::test]
    async fn joined_unknown_member_is_jailed() {
        let transport = Arc::new(ScriptedTransport::new(|request| {
            if request.url.contains("torn.test") {
                return Ok(json_response(
                    200,
                    json!({"error": {"code": 6, "error": "Incorrect ID"}}),
                    &[],
                ));
            }
            Ok(json_response(200, json!({}), &[]))
        }));
        let (test, state) = state_with(transport, settings()).await;
        let db = test.db.as_ref().unwrap();
        let admin = factory::create_user(db).await.unwrap();
        factory::create_torn_key(db, admin.tid).await.unwrap();
        let server = factory::server::ServerFactory::new(db)
            .admins(vec![admin.tid])
            .verify_enabled(true)
            .verify_jail_channel(777)
            .build()
            .await
            .unwrap();
        let member = MemberSnapshot {
            user_id: 12,
            roles: vec![],
            nick: None,
            username: "user12".to_string(),
            automated: false,
        };

        let result = VerifyEngine::new(&state)
            .verify_member(server.guild_id, &member, false, true)
            .await
            .unwrap();

        assert_eq!(result, Reconciled::Skipped);
        let routes: Vec<String> = drain(&state)
            .await
            .into_iter()
            .filter_map(|task| match task {
                Task::DiscordCall { route, .. } => Some(route),
                _ => None,
            })
            .collect();
        assert_eq!(routes, vec!["channels/777/messages".to_string()]);
    }

    #[tokio::test]
    async fn bots_are_skipped() {
        let (_test, state, guild_id) = setup(100, vec![], &[]).await;
        let member = MemberSnapshot {
            user_id: 3,
            roles: vec![],
            nick: None,
            username: "bot".to_string(),
            automated: true,
        };

        let result = VerifyEngine::new(&state)
            .verify_member(guild_id, &member, false, false)
            .await
            .unwrap();

        assert_eq!(result, Reconciled::Skipped);
        assert!(drain(&state).await.is_empty());
    }

    #[tokio::test]
    async fn fan_out_queues_only_guilds_in_current_slot() {
        let transport = Arc::new(ScriptedTransport::new(responder(0, vec![])));
        let (test, state) = state_with(transport, settings()).await;
        let db = test.db.as_ref().unwrap();
        for guild_id in [96 * 10_000 + 5, 96 * 10_000 + 6] {
            factory::server::ServerFactory::new(db)
                .guild_id(guild_id)
                .verify_enabled(true)
                .auto_verify_enabled(true)
                .build()
                .await
                .unwrap();
        }
        let now = DateTime::from_timestamp(5 * 900 + 30, 0).unwrap();

        let queued = VerifyEngine::new(&state).fan_out(now).await.unwrap();

        assert_eq!(queued, 1);
        assert_eq!(
            drain(&state).await,
            vec![Task::VerifyGuild {
                guild_id: 96 * 10_000 + 5,
                cursor: 0,
                force: false,
            }]
        );
    }
}
