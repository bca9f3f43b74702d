//! Generic Repository
//!
//! [`Repository<M, V>`] gives every [`Entity`] the same CRUD surface:
//! lookups, paging, sparse and explicit updates, full saves that protect
//! audit columns, and deletes. `V` is the read projection (`V: From<M>`).
//!
//! Every call runs through the [`HookEngine`] (when one is attached) with the
//! repository's [`CallContext`]: inserts get audit stamps, reads are narrowed
//! to the caller's query scope, writes to the caller's update scope.
//!
//! ```ignore
//! let repo: Repository<Role, RoleView> = state.repository().with_context(ctx);
//! let page = repo.find_page_view(PageParam::new(1, 20), Filter::All).await?;
//! ```

mod entity;
mod patch;

pub use entity::{Entity, EntityColumns, is_zero, sparse};
pub use patch::Patch;

use crate::auth::CallContext;
use crate::db::filter::{Filter, OrderBy, Record};
use crate::db::store::{RelationalStore, SelectQuery};
use crate::hooks::HookEngine;
use crate::utils::now_millis;
use serde_json::Value;
use shared::error::{AppError, AppResult};
use shared::{OrderParam, PageParam, PageResult, SortType};
use std::marker::PhantomData;
use std::sync::Arc;

/// Load rows straight from the store, bypassing hooks
///
/// The role and department caches read through this so the hook path never
/// re-enters a [`Repository`].
pub async fn load_rows<M: Entity>(
    store: &dyn RelationalStore,
    query: &SelectQuery,
) -> AppResult<Vec<M>> {
    let rows = store.select(&M::meta(), query).await?;
    rows.into_iter().map(decode_row).collect()
}

fn decode_row<M: Entity>(record: Record) -> AppResult<M> {
    serde_json::from_value(Value::Object(record))
        .map_err(|e| AppError::database(format!("decode {}: {e}", M::TABLE)))
}

pub struct Repository<M, V = M> {
    store: Arc<dyn RelationalStore>,
    hooks: Option<Arc<HookEngine>>,
    ctx: CallContext,
    unscoped: bool,
    _marker: PhantomData<fn() -> (M, V)>,
}

impl<M, V> Clone for Repository<M, V> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            hooks: self.hooks.clone(),
            ctx: self.ctx.clone(),
            unscoped: self.unscoped,
            _marker: PhantomData,
        }
    }
}

impl<M, V> Repository<M, V>
where
    M: Entity,
    V: From<M>,
{
    /// Repository bound to a background context
    pub fn new(store: Arc<dyn RelationalStore>, hooks: Option<Arc<HookEngine>>) -> Self {
        Self {
            store,
            hooks,
            ctx: CallContext::background(),
            unscoped: false,
            _marker: PhantomData,
        }
    }

    /// Same repository, different caller
    pub fn with_context(&self, ctx: CallContext) -> Self {
        Self {
            ctx,
            ..self.clone()
        }
    }

    /// Bypass hooks (bootstrap, cache rebuilds, login lookups)
    pub fn skip_hooks(&self) -> Self {
        Self {
            ctx: self.ctx.skip_hooks(),
            ..self.clone()
        }
    }

    /// Include soft-deleted rows; deletes become physical
    pub fn unscoped(&self) -> Self {
        Self {
            unscoped: true,
            ..self.clone()
        }
    }

    pub fn context(&self) -> &CallContext {
        &self.ctx
    }

    // ==================== Internal ====================

    fn to_record(entity: &M) -> AppResult<Record> {
        match serde_json::to_value(entity) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(AppError::internal(format!(
                "{} does not serialize to a row",
                M::TABLE
            ))),
            Err(e) => Err(AppError::internal(format!("encode {}: {e}", M::TABLE))),
        }
    }


    fn key_filter(id: i64) -> Filter {
        Filter::eq(M::columns().primary_key, id)
    }

    async fn query_scope(&self, filter: Filter) -> AppResult<Filter> {
        match &self.hooks {
            Some(hooks) => hooks.before_query(&self.ctx, &M::columns(), filter).await,
            None => Ok(filter),
        }
    }

    async fn update_scope(&self, filter: Filter, assignments: &mut Record) -> AppResult<Filter> {
        match &self.hooks {
            Some(hooks) => {
                hooks
                    .before_update(&self.ctx, &M::columns(), filter, assignments)
                    .await
            }
            None => Ok(filter),
        }
    }

    async fn select(&self, query: SelectQuery) -> AppResult<Vec<M>> {
        load_rows(self.store.as_ref(), &query).await
    }

    async fn write(&self, filter: Filter, mut assignments: Record, omit: &[&str]) -> AppResult<u64> {
        let cols = M::columns();
        assignments.insert(cols.update_time.to_string(), Value::from(now_millis()));
        let filter = self.update_scope(filter, &mut assignments).await?;
        for column in omit {
            assignments.remove(*column);
        }
        let affected = self
            .store
            .update(&M::meta(), &filter, &assignments, self.unscoped)
            .await?;
        tracing::debug!(table = M::TABLE, affected, "update");
        Ok(affected)
    }

    /// `OrderParam` -> `OrderBy`, rejecting unknown columns and sort types
    pub fn order_by(params: &[OrderParam]) -> AppResult<Vec<OrderBy>> {
        params
            .iter()
            .filter(|p| !p.is_empty())
            .map(|p| {
                let column = p.column();
                if !M::has_column(&column) {
                    return Err(AppError::validation(format!(
                        "unknown sort column {} on {}",
                        p.sort_name,
                        M::TABLE
                    ))
                    .with_detail("field", "sortName"));
                }
                Ok(OrderBy {
                    column,
                    sort: SortType::parse(&p.sort_type)?,
                })
            })
            .collect()
    }

    // ==================== Reads ====================

    pub async fn find_one_by_key(&self, id: i64) -> AppResult<M> {
        self.find_one(Self::key_filter(id)).await
    }

    pub async fn find_one(&self, filter: Filter) -> AppResult<M> {
        let filter = self.query_scope(filter).await?;
        let query = SelectQuery::new(filter).limit(1).unscoped(self.unscoped);
        self.select(query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::not_found(M::TABLE))
    }

    pub async fn find_list(&self, filter: Filter) -> AppResult<Vec<M>> {
        self.find_list_sorted(filter, &[]).await
    }

    pub async fn find_list_sorted(&self, filter: Filter, order: &[OrderParam]) -> AppResult<Vec<M>> {
        let order = Self::order_by(order)?;
        let filter = self.query_scope(filter).await?;
        let query = SelectQuery::new(filter)
            .order(order)
            .unscoped(self.unscoped);
        self.select(query).await
    }

    pub async fn find_page(&self, page: PageParam, filter: Filter) -> AppResult<PageResult<M>> {
        self.find_page_sorted(page, filter, &[]).await
    }

    /// Page query
    ///
    /// A short page is the last page and its total follows from the offset,
    /// so the COUNT query only runs when the page is full.
    pub async fn find_page_sorted(
        &self,
        page: PageParam,
        filter: Filter,
        order: &[OrderParam],
    ) -> AppResult<PageResult<M>> {
        page.check()?;
        let order = Self::order_by(order)?;
        let filter = self.query_scope(filter).await?;

        let query = SelectQuery::new(filter.clone())
            .order(order)
            .limit(page.page_size)
            .offset(page.offset())
            .unscoped(self.unscoped);
        let items = self.select(query).await?;

        let fetched = items.len() as i64;
        let (total, last_page) = if fetched < page.page_size {
            (page.offset() + fetched, true)
        } else {
            let total = self.store.count(&M::meta(), &filter, self.unscoped).await?;
            let pages = (total + page.page_size - 1) / page.page_size;
            (total, page.page >= pages)
        };

        Ok(PageResult {
            items,
            total,
            page: page.page,
            page_size: page.page_size,
            last_page,
        })
    }

    pub async fn count(&self, filter: Filter) -> AppResult<i64> {
        let filter = self.query_scope(filter).await?;
        Ok(self.store.count(&M::meta(), &filter, self.unscoped).await?)
    }

    pub async fn exist(&self, filter: Filter) -> AppResult<bool> {
        Ok(self.count(filter).await? > 0)
    }

    // ==================== View projections ====================

    pub async fn find_one_by_key_view(&self, id: i64) -> AppResult<V> {
        self.find_one_by_key(id).await.map(V::from)
    }

    pub async fn find_one_view(&self, filter: Filter) -> AppResult<V> {
        self.find_one(filter).await.map(V::from)
    }

    pub async fn find_list_view(&self, filter: Filter) -> AppResult<Vec<V>> {
        self.find_list_sorted_view(filter, &[]).await
    }

    pub async fn find_list_sorted_view(
        &self,
        filter: Filter,
        order: &[OrderParam],
    ) -> AppResult<Vec<V>> {
        Ok(self
            .find_list_sorted(filter, order)
            .await?
            .into_iter()
            .map(V::from)
            .collect())
    }

    pub async fn find_page_view(&self, page: PageParam, filter: Filter) -> AppResult<PageResult<V>> {
        self.find_page_sorted_view(page, filter, &[]).await
    }

    pub async fn find_page_sorted_view(
        &self,
        page: PageParam,
        filter: Filter,
        order: &[OrderParam],
    ) -> AppResult<PageResult<V>> {
        Ok(self.find_page_sorted(page, filter, order).await?.map(V::from))
    }

    // ==================== Writes ====================

    pub async fn insert_one(&self, entity: M) -> AppResult<M> {
        self.insert_batch(vec![entity])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::database(format!("insert into {} returned no row", M::TABLE)))
    }

    /// Insert rows; keys are always generated by the store
    pub async fn insert_batch(&self, entities: Vec<M>) -> AppResult<Vec<M>> {
        if entities.is_empty() {
            return Ok(Vec::new());
        }
        let cols = M::columns();
        let now = Value::from(now_millis());

        let mut rows = Vec::with_capacity(entities.len());
        for mut entity in entities {
            entity.clear_primary_key();
            let mut record = Self::to_record(&entity)?;
            for key in cols.keys() {
                record.remove(key);
            }
            for column in [cols.create_time, cols.update_time] {
                if record.get(column).is_none_or(is_zero) {
                    record.insert(column.to_string(), now.clone());
                }
            }
            if let Some(hooks) = &self.hooks {
                hooks.before_create(&self.ctx, &cols, &mut record).await?;
            }
            rows.push(record);
        }

        let stored = self.store.insert(&M::meta(), rows).await?;
        tracing::debug!(table = M::TABLE, rows = stored.len(), "insert");
        stored.into_iter().map(decode_row).collect()
    }

    /// Sparse update by primary key: zero values are not written
    pub async fn update_by_key(&self, id: i64, entity: &M) -> AppResult<u64> {
        self.update_by(entity, Self::key_filter(id)).await
    }

    /// Sparse update of every row matching `filter`
    pub async fn update_by(&self, entity: &M, filter: Filter) -> AppResult<u64> {
        let record = sparse(Self::to_record(entity)?);
        self.write(filter, record, &M::columns().keys()).await
    }

    /// Write exactly the fields named in `patch`, zero values included
    ///
    /// Keys and protected audit columns in the patch are dropped; columns the
    /// entity does not have are rejected.
    pub async fn update_fields(&self, id: i64, patch: Patch) -> AppResult<u64> {
        let cols = M::columns();
        let protected = cols.protected();
        let record: Record = patch
            .into_record()
            .into_iter()
            .filter(|(column, _)| !protected.contains(&column.as_str()))
            .collect();
        if let Some(column) = record.keys().find(|c| !M::has_column(c)) {
            return Err(AppError::validation(format!(
                "unknown column {column} on {}",
                M::TABLE
            ))
            .with_detail("field", column.as_str()));
        }
        if record.is_empty() {
            return Ok(0);
        }
        self.write(Self::key_filter(id), record, &cols.keys()).await
    }

    /// Full overwrite by primary key, except keys, creator, creator
    /// department, create time, updater, delete marker and `extra_omit`
    pub async fn save_by_key(&self, id: i64, entity: &M, extra_omit: &[&str]) -> AppResult<u64> {
        let mut omit = M::columns().protected();
        omit.extend_from_slice(extra_omit);
        let record = Self::to_record(entity)?;
        self.write(Self::key_filter(id), record, &omit).await
    }

    pub async fn delete_by_keys(&self, ids: &[i64]) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.delete_by(Filter::is_in(M::columns().primary_key, ids.iter().copied()))
            .await
    }

    pub async fn delete_by(&self, filter: Filter) -> AppResult<u64> {
        let filter = match &self.hooks {
            Some(hooks) => hooks.before_delete(&self.ctx, &M::columns(), filter).await?,
            None => filter,
        };
        let affected = self.store.delete(&M::meta(), &filter, self.unscoped).await?;
        tracing::debug!(table = M::TABLE, affected, unscoped = self.unscoped, "delete");
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Role;

    #[test]
    fn test_order_by_checks_columns() {
        let order = Repository::<Role>::order_by(&[
            OrderParam::new("updateTime", "desc"),
            OrderParam::new("", ""),
            OrderParam::new("code", ""),
        ])
        .unwrap();
        assert_eq!(order, vec![OrderBy::desc("update_time"), OrderBy::asc("code")]);

        let err = Repository::<Role>::order_by(&[OrderParam::new("password", "asc")]).unwrap_err();
        assert_eq!(err.code, shared::ErrorCode::ValidationFailed);

        assert!(Repository::<Role>::order_by(&[OrderParam::new("code", "upward")]).is_err());
    }
}
