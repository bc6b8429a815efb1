//! PostgreSQL store.
//!
//! One table per entity, created on connect with idempotent DDL. Every write
//! runs in an explicit transaction; returning early with `?` drops the
//! transaction, which rolls it back. Foreign keys in a payload are checked
//! against the owner with `FOR SHARE` row locks inside the same transaction.

use std::collections::HashMap;

use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::models::{
    Account, Address, AddressFields, Client, ClientFields, Developer, DeveloperFields, InfraItem,
    InfraItemFields, InfraItemLinks, NewAccount, Project, ProjectFields, ProjectLinks,
    SecretChange,
};
use crate::{Store, StorageError};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS enderecos (\
        id_endereco  UUID PRIMARY KEY DEFAULT gen_random_uuid(), \
        user_id      UUID NOT NULL, \
        rua          VARCHAR(255) NOT NULL, \
        numero       VARCHAR(50) NOT NULL, \
        complemento  VARCHAR(100), \
        bairro       VARCHAR(100), \
        cidade       VARCHAR(100) NOT NULL, \
        estado       VARCHAR(50) NOT NULL, \
        cep          VARCHAR(20) NOT NULL, \
        data_criacao TIMESTAMPTZ NOT NULL DEFAULT now()\
    )",
    "CREATE TABLE IF NOT EXISTS desenvolvedores (\
        id_desenvolvedor UUID PRIMARY KEY DEFAULT gen_random_uuid(), \
        user_id          UUID NOT NULL, \
        id_endereco      UUID NOT NULL REFERENCES enderecos (id_endereco), \
        nome             VARCHAR(255) NOT NULL, \
        email            VARCHAR(255) NOT NULL, \
        telefone         VARCHAR(50), \
        documento_fiscal VARCHAR(50) NOT NULL, \
        tipo_contrato    VARCHAR(50), \
        taxa_horaria     NUMERIC(10, 2), \
        data_criacao     TIMESTAMPTZ NOT NULL DEFAULT now(), \
        UNIQUE (user_id, email)\
    )",
    "CREATE TABLE IF NOT EXISTS clientes (\
        id_cliente            UUID PRIMARY KEY DEFAULT gen_random_uuid(), \
        user_id               UUID NOT NULL, \
        id_endereco           UUID REFERENCES enderecos (id_endereco), \
        nome                  VARCHAR(255) NOT NULL, \
        email                 VARCHAR(255) NOT NULL, \
        telefone              VARCHAR(50), \
        pessoa_contato        VARCHAR(255), \
        documento_fiscal      VARCHAR(50), \
        segmento              VARCHAR(100), \
        status_relacionamento VARCHAR(50), \
        origem                VARCHAR(100), \
        observacoes           TEXT, \
        data_criacao          TIMESTAMPTZ NOT NULL DEFAULT now(), \
        data_ultimo_contato   TIMESTAMPTZ, \
        UNIQUE (user_id, email)\
    )",
    "CREATE TABLE IF NOT EXISTS usuarios (\
        id_usuario       UUID PRIMARY KEY DEFAULT gen_random_uuid(), \
        nome             VARCHAR(150) NOT NULL UNIQUE, \
        email            VARCHAR(255) UNIQUE, \
        hashed_password  TEXT NOT NULL, \
        is_active        BOOLEAN NOT NULL DEFAULT TRUE, \
        is_admin         BOOLEAN NOT NULL DEFAULT FALSE, \
        created_at       TIMESTAMPTZ NOT NULL DEFAULT now(), \
        id_desenvolvedor UUID REFERENCES desenvolvedores (id_desenvolvedor)\
    )",
    "CREATE TABLE IF NOT EXISTS servicos_projetos (\
        id_servico       UUID PRIMARY KEY DEFAULT gen_random_uuid(), \
        user_id          UUID NOT NULL, \
        id_cliente       UUID NOT NULL REFERENCES clientes (id_cliente), \
        id_desenvolvedor UUID REFERENCES desenvolvedores (id_desenvolvedor), \
        titulo           VARCHAR(255) NOT NULL, \
        escopo           TEXT NOT NULL, \
        status_projeto   VARCHAR(50) NOT NULL, \
        data_inicio      TIMESTAMPTZ, \
        data_limite      TIMESTAMPTZ, \
        orcamento        NUMERIC(10, 2), \
        notas_internas   TEXT\
    )",
    "CREATE TABLE IF NOT EXISTS itens_infraestrutura (\
        id_item          UUID PRIMARY KEY DEFAULT gen_random_uuid(), \
        user_id          UUID NOT NULL, \
        id_cliente       UUID NOT NULL REFERENCES clientes (id_cliente), \
        id_servico       UUID REFERENCES servicos_projetos (id_servico), \
        id_desenvolvedor UUID REFERENCES desenvolvedores (id_desenvolvedor), \
        tipo_item        VARCHAR(50) NOT NULL, \
        descricao        VARCHAR(255) NOT NULL, \
        url_acesso       VARCHAR(512), \
        usuario          VARCHAR(100), \
        referencia_senha TEXT, \
        is_critico       BOOLEAN NOT NULL DEFAULT FALSE, \
        data_expiracao   TIMESTAMPTZ, \
        notas_acesso     TEXT\
    )",
    "CREATE INDEX IF NOT EXISTS idx_clientes_user ON clientes (user_id)",
    "CREATE INDEX IF NOT EXISTS idx_desenvolvedores_user ON desenvolvedores (user_id)",
    "CREATE INDEX IF NOT EXISTS idx_servicos_projetos_user ON servicos_projetos (user_id)",
    "CREATE INDEX IF NOT EXISTS idx_itens_infraestrutura_user ON itens_infraestrutura (user_id)",
];

/// Map a sqlx error to a storage error for the given entity.
fn query_error(entity: &'static str) -> impl Fn(sqlx::Error) -> StorageError {
    move |e| {
        if let sqlx::Error::Database(db) = &e {
            match db.code().as_deref() {
                Some("23505") => return StorageError::Conflict { entity },
                Some("23503") => return StorageError::InUse { entity },
                _ => {}
            }
        }
        StorageError::Query {
            entity,
            reason: e.to_string(),
        }
    }
}

fn tx_error(e: sqlx::Error) -> StorageError {
    StorageError::Transaction {
        reason: e.to_string(),
    }
}

/// Check that `id` exists in `table` and belongs to `owner`, taking a row
/// lock of the given strength until the transaction ends.
async fn owned_row_locked(
    conn: &mut PgConnection,
    table: &'static str,
    key: &'static str,
    entity: &'static str,
    owner: Uuid,
    id: Uuid,
    lock: &'static str,
) -> Result<bool, StorageError> {
    let sql = format!("SELECT 1 FROM {table} WHERE {key} = $1 AND user_id = $2 {lock}");
    let found: Option<i32> = sqlx::query_scalar(&sql)
        .bind(id)
        .bind(owner)
        .fetch_optional(&mut *conn)
        .await
        .map_err(query_error(entity))?;
    Ok(found.is_some())
}

/// Lock a payload foreign key. Missing or foreign-owned is an invalid
/// reference.
async fn lock_reference(
    conn: &mut PgConnection,
    table: &'static str,
    key: &'static str,
    entity: &'static str,
    owner: Uuid,
    id: Uuid,
) -> Result<(), StorageError> {
    if owned_row_locked(conn, table, key, entity, owner, id, "FOR SHARE").await? {
        Ok(())
    } else {
        Err(StorageError::InvalidReference { entity })
    }
}

/// Lock the row an update targets. Missing or foreign-owned is not found.
async fn lock_target(
    conn: &mut PgConnection,
    table: &'static str,
    key: &'static str,
    entity: &'static str,
    owner: Uuid,
    id: Uuid,
) -> Result<(), StorageError> {
    if owned_row_locked(conn, table, key, entity, owner, id, "FOR UPDATE").await? {
        Ok(())
    } else {
        Err(StorageError::NotFound { entity })
    }
}

async fn check_project_links(
    conn: &mut PgConnection,
    owner: Uuid,
    links: &ProjectLinks,
) -> Result<(), StorageError> {
    lock_reference(conn, "clientes", "id_cliente", "client", owner, links.client_id).await?;
    if let Some(id) = links.developer_id {
        lock_reference(conn, "desenvolvedores", "id_desenvolvedor", "developer", owner, id).await?;
    }
    Ok(())
}

async fn check_item_links(
    conn: &mut PgConnection,
    owner: Uuid,
    links: &InfraItemLinks,
) -> Result<(), StorageError> {
    lock_reference(conn, "clientes", "id_cliente", "client", owner, links.client_id).await?;
    if let Some(id) = links.developer_id {
        lock_reference(conn, "desenvolvedores", "id_desenvolvedor", "developer", owner, id).await?;
    }
    if let Some(id) = links.project_id {
        lock_reference(conn, "servicos_projetos", "id_servico", "project", owner, id).await?;
    }
    Ok(())
}

async fn insert_address(
    conn: &mut PgConnection,
    owner: Uuid,
    fields: &AddressFields,
) -> Result<Address, StorageError> {
    sqlx::query_as(
        "INSERT INTO enderecos (user_id, rua, numero, complemento, bairro, cidade, estado, cep) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING *",
    )
    .bind(owner)
    .bind(&fields.street)
    .bind(&fields.number)
    .bind(&fields.complement)
    .bind(&fields.district)
    .bind(&fields.city)
    .bind(&fields.state)
    .bind(&fields.postal_code)
    .fetch_one(&mut *conn)
    .await
    .map_err(query_error("address"))
}

async fn write_address(
    conn: &mut PgConnection,
    owner: Uuid,
    id: Uuid,
    fields: &AddressFields,
) -> Result<Option<Address>, StorageError> {
    sqlx::query_as(
        "UPDATE enderecos SET rua = $3, numero = $4, complemento = $5, bairro = $6, \
         cidade = $7, estado = $8, cep = $9 \
         WHERE id_endereco = $1 AND user_id = $2 RETURNING *",
    )
    .bind(id)
    .bind(owner)
    .bind(&fields.street)
    .bind(&fields.number)
    .bind(&fields.complement)
    .bind(&fields.district)
    .bind(&fields.city)
    .bind(&fields.state)
    .bind(&fields.postal_code)
    .fetch_optional(&mut *conn)
    .await
    .map_err(query_error("address"))
}

async fn fetch_address(
    conn: &mut PgConnection,
    owner: Uuid,
    id: Uuid,
) -> Result<Option<Address>, StorageError> {
    sqlx::query_as("SELECT * FROM enderecos WHERE id_endereco = $1 AND user_id = $2")
        .bind(id)
        .bind(owner)
        .fetch_optional(&mut *conn)
        .await
        .map_err(query_error("address"))
}

async fn delete_address(conn: &mut PgConnection, owner: Uuid, id: Uuid) -> Result<(), StorageError> {
    sqlx::query("DELETE FROM enderecos WHERE id_endereco = $1 AND user_id = $2")
        .bind(id)
        .bind(owner)
        .execute(&mut *conn)
        .await
        .map_err(query_error("address"))?;
    Ok(())
}

/// A [`Store`] backed by PostgreSQL.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl std::fmt::Debug for PostgresStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresStore")
            .field("pool", &"[PgPool]")
            .finish_non_exhaustive()
    }
}

impl PostgresStore {
    /// Connect to PostgreSQL and create any missing tables.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Open`] if the connection or the schema setup
    /// fails.
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| StorageError::Open {
                reason: e.to_string(),
            })?;

        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .map_err(|e| StorageError::Open {
                    reason: format!("schema setup failed: {e}"),
                })?;
        }
        tracing::info!(statements = SCHEMA.len(), "PostgreSQL schema ready");

        Ok(Self { pool })
    }

    /// Attach addresses to a batch of clients or developers with one query.
    async fn addresses_by_id(
        &self,
        owner: Uuid,
        ids: Vec<Uuid>,
    ) -> Result<HashMap<Uuid, Address>, StorageError> {
        let rows: Vec<Address> = sqlx::query_as(
            "SELECT * FROM enderecos WHERE user_id = $1 AND id_endereco = ANY($2)",
        )
        .bind(owner)
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(query_error("address"))?;
        Ok(rows.into_iter().map(|a| (a.id, a)).collect())
    }
}

#[async_trait::async_trait]
impl Store for PostgresStore {
    async fn create_account(&self, account: NewAccount) -> Result<Account, StorageError> {
        let mut tx = self.pool.begin().await.map_err(tx_error)?;
        // SHARE ROW EXCLUSIVE conflicts with itself: registrations serialize.
        sqlx::query("LOCK TABLE usuarios IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut *tx)
            .await
            .map_err(query_error("account"))?;

        // Name and email share one login namespace.
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM usuarios \
             WHERE nome = $1 OR email = $1 OR nome = $2 OR email = $2)",
        )
        .bind(&account.name)
        .bind(&account.email)
        .fetch_one(&mut *tx)
        .await
        .map_err(query_error("account"))?;
        if taken {
            return Err(StorageError::Conflict { entity: "account" });
        }

        let row: Account = sqlx::query_as(
            "INSERT INTO usuarios (nome, email, hashed_password) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(&account.name)
        .bind(&account.email)
        .bind(&account.password_hash)
        .fetch_one(&mut *tx)
        .await
        .map_err(query_error("account"))?;
        tx.commit().await.map_err(tx_error)?;
        Ok(row)
    }

    async fn find_account_by_login(&self, login: &str) -> Result<Option<Account>, StorageError> {
        sqlx::query_as(
            "SELECT * FROM usuarios WHERE nome = $1 OR email = $1 \
             ORDER BY (nome = $1) DESC LIMIT 1",
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_error("account"))
    }

    async fn get_account(&self, id: Uuid) -> Result<Option<Account>, StorageError> {
        sqlx::query_as("SELECT * FROM usuarios WHERE id_usuario = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_error("account"))
    }

    async fn link_account_developer(
        &self,
        owner: Uuid,
        developer_id: Option<Uuid>,
    ) -> Result<Account, StorageError> {
        let mut tx = self.pool.begin().await.map_err(tx_error)?;
        if let Some(id) = developer_id {
            lock_reference(&mut tx, "desenvolvedores", "id_desenvolvedor", "developer", owner, id)
                .await?;
        }
        let account: Account = sqlx::query_as(
            "UPDATE usuarios SET id_desenvolvedor = $2 WHERE id_usuario = $1 RETURNING *",
        )
        .bind(owner)
        .bind(developer_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(query_error("account"))?
        .ok_or(StorageError::NotFound { entity: "account" })?;
        tx.commit().await.map_err(tx_error)?;
        Ok(account)
    }

    async fn get_address(&self, owner: Uuid, id: Uuid) -> Result<Address, StorageError> {
        let mut conn = self.pool.acquire().await.map_err(query_error("address"))?;
        fetch_address(&mut conn, owner, id)
            .await?
            .ok_or(StorageError::NotFound { entity: "address" })
    }

    async fn update_address(
        &self,
        owner: Uuid,
        id: Uuid,
        fields: AddressFields,
    ) -> Result<Address, StorageError> {
        let mut conn = self.pool.acquire().await.map_err(query_error("address"))?;
        write_address(&mut conn, owner, id, &fields)
            .await?
            .ok_or(StorageError::NotFound { entity: "address" })
    }

    async fn list_clients(&self, owner: Uuid) -> Result<Vec<Client>, StorageError> {
        let mut clients: Vec<Client> =
            sqlx::query_as("SELECT * FROM clientes WHERE user_id = $1 ORDER BY nome")
                .bind(owner)
                .fetch_all(&self.pool)
                .await
                .map_err(query_error("client"))?;
        let ids = clients.iter().filter_map(|c| c.address_id).collect();
        let mut addresses = self.addresses_by_id(owner, ids).await?;
        for client in &mut clients {
            client.address = client.address_id.and_then(|id| addresses.remove(&id));
        }
        Ok(clients)
    }

    async fn get_client(&self, owner: Uuid, id: Uuid) -> Result<Client, StorageError> {
        let mut conn = self.pool.acquire().await.map_err(query_error("client"))?;
        let mut client: Client =
            sqlx::query_as("SELECT * FROM clientes WHERE id_cliente = $1 AND user_id = $2")
                .bind(id)
                .bind(owner)
                .fetch_optional(&mut *conn)
                .await
                .map_err(query_error("client"))?
                .ok_or(StorageError::NotFound { entity: "client" })?;
        if let Some(address_id) = client.address_id {
            client.address = fetch_address(&mut conn, owner, address_id).await?;
        }
        Ok(client)
    }

    async fn create_client(
        &self,
        owner: Uuid,
        fields: ClientFields,
        address: AddressFields,
    ) -> Result<Client, StorageError> {
        let mut tx = self.pool.begin().await.map_err(tx_error)?;
        let address = insert_address(&mut tx, owner, &address).await?;
        let mut client: Client = sqlx::query_as(
            "INSERT INTO clientes (user_id, id_endereco, nome, email, telefone, pessoa_contato, \
             documento_fiscal, segmento, status_relacionamento, origem, observacoes, \
             data_ultimo_contato) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) RETURNING *",
        )
        .bind(owner)
        .bind(address.id)
        .bind(&fields.name)
        .bind(&fields.email)
        .bind(&fields.phone)
        .bind(&fields.contact_person)
        .bind(&fields.tax_document)
        .bind(&fields.segment)
        .bind(&fields.relationship_status)
        .bind(&fields.origin)
        .bind(&fields.notes)
        .bind(fields.last_contact_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(query_error("client"))?;
        tx.commit().await.map_err(tx_error)?;
        client.address = Some(address);
        Ok(client)
    }

    async fn update_client(
        &self,
        owner: Uuid,
        id: Uuid,
        fields: ClientFields,
        address: Option<AddressFields>,
    ) -> Result<Client, StorageError> {
        let mut tx = self.pool.begin().await.map_err(tx_error)?;
        let current: Option<Uuid> = sqlx::query_scalar(
            "SELECT id_endereco FROM clientes WHERE id_cliente = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(id)
        .bind(owner)
        .fetch_optional(&mut *tx)
        .await
        .map_err(query_error("client"))?
        .ok_or(StorageError::NotFound { entity: "client" })?;

        let mut address_id = current;
        let mut stored_address = None;
        if let Some(address) = address {
            let written = match address_id {
                Some(aid) => write_address(&mut tx, owner, aid, &address).await?,
                None => None,
            };
            let written = match written {
                Some(a) => a,
                None => insert_address(&mut tx, owner, &address).await?,
            };
            address_id = Some(written.id);
            stored_address = Some(written);
        }

        let mut client: Client = sqlx::query_as(
            "UPDATE clientes SET id_endereco = $3, nome = $4, email = $5, telefone = $6, \
             pessoa_contato = $7, documento_fiscal = $8, segmento = $9, \
             status_relacionamento = $10, origem = $11, observacoes = $12, \
             data_ultimo_contato = $13 \
             WHERE id_cliente = $1 AND user_id = $2 RETURNING *",
        )
        .bind(id)
        .bind(owner)
        .bind(address_id)
        .bind(&fields.name)
        .bind(&fields.email)
        .bind(&fields.phone)
        .bind(&fields.contact_person)
        .bind(&fields.tax_document)
        .bind(&fields.segment)
        .bind(&fields.relationship_status)
        .bind(&fields.origin)
        .bind(&fields.notes)
        .bind(fields.last_contact_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(query_error("client"))?;

        if stored_address.is_none() {
            if let Some(aid) = address_id {
                stored_address = fetch_address(&mut tx, owner, aid).await?;
            }
        }
        tx.commit().await.map_err(tx_error)?;
        client.address = stored_address;
        Ok(client)
    }

    async fn delete_client(&self, owner: Uuid, id: Uuid) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(tx_error)?;
        let address_id: Option<Uuid> = sqlx::query_scalar(
            "DELETE FROM clientes WHERE id_cliente = $1 AND user_id = $2 RETURNING id_endereco",
        )
        .bind(id)
        .bind(owner)
        .fetch_optional(&mut *tx)
        .await
        .map_err(query_error("client"))?
        .ok_or(StorageError::NotFound { entity: "client" })?;
        if let Some(aid) = address_id {
            delete_address(&mut tx, owner, aid).await?;
        }
        tx.commit().await.map_err(tx_error)?;
        Ok(())
    }

    async fn list_developers(&self, owner: Uuid) -> Result<Vec<Developer>, StorageError> {
        let mut developers: Vec<Developer> =
            sqlx::query_as("SELECT * FROM desenvolvedores WHERE user_id = $1 ORDER BY nome")
                .bind(owner)
                .fetch_all(&self.pool)
                .await
                .map_err(query_error("developer"))?;
        let ids = developers.iter().map(|d| d.address_id).collect();
        let mut addresses = self.addresses_by_id(owner, ids).await?;
        for developer in &mut developers {
            developer.address = addresses.remove(&developer.address_id);
        }
        Ok(developers)
    }

    async fn get_developer(&self, owner: Uuid, id: Uuid) -> Result<Developer, StorageError> {
        let mut conn = self.pool.acquire().await.map_err(query_error("developer"))?;
        let mut developer: Developer = sqlx::query_as(
            "SELECT * FROM desenvolvedores WHERE id_desenvolvedor = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(owner)
        .fetch_optional(&mut *conn)
        .await
        .map_err(query_error("developer"))?
        .ok_or(StorageError::NotFound { entity: "developer" })?;
        developer.address = fetch_address(&mut conn, owner, developer.address_id).await?;
        Ok(developer)
    }

    async fn create_developer(
        &self,
        owner: Uuid,
        fields: DeveloperFields,
        address: AddressFields,
    ) -> Result<Developer, StorageError> {
        let mut tx = self.pool.begin().await.map_err(tx_error)?;
        let address = insert_address(&mut tx, owner, &address).await?;
        let mut developer: Developer = sqlx::query_as(
            "INSERT INTO desenvolvedores (user_id, id_endereco, nome, email, telefone, \
             documento_fiscal, tipo_contrato, taxa_horaria) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING *",
        )
        .bind(owner)
        .bind(address.id)
        .bind(&fields.name)
        .bind(&fields.email)
        .bind(&fields.phone)
        .bind(&fields.tax_document)
        .bind(&fields.contract_type)
        .bind(fields.hourly_rate)
        .fetch_one(&mut *tx)
        .await
        .map_err(query_error("developer"))?;
        tx.commit().await.map_err(tx_error)?;
        developer.address = Some(address);
        Ok(developer)
    }

    async fn update_developer(
        &self,
        owner: Uuid,
        id: Uuid,
        fields: DeveloperFields,
        address: Option<AddressFields>,
    ) -> Result<Developer, StorageError> {
        let mut tx = self.pool.begin().await.map_err(tx_error)?;
        let mut developer: Developer = sqlx::query_as(
            "UPDATE desenvolvedores SET nome = $3, email = $4, telefone = $5, \
             documento_fiscal = $6, tipo_contrato = $7, taxa_horaria = $8 \
             WHERE id_desenvolvedor = $1 AND user_id = $2 RETURNING *",
        )
        .bind(id)
        .bind(owner)
        .bind(&fields.name)
        .bind(&fields.email)
        .bind(&fields.phone)
        .bind(&fields.tax_document)
        .bind(&fields.contract_type)
        .bind(fields.hourly_rate)
        .fetch_optional(&mut *tx)
        .await
        .map_err(query_error("developer"))?
        .ok_or(StorageError::NotFound { entity: "developer" })?;

        developer.address = match address {
            Some(address) => {
                let written = write_address(&mut tx, owner, developer.address_id, &address)
                    .await?
                    .ok_or(StorageError::NotFound { entity: "address" })?;
                Some(written)
            }
            None => fetch_address(&mut tx, owner, developer.address_id).await?,
        };
        tx.commit().await.map_err(tx_error)?;
        Ok(developer)
    }

    async fn delete_developer(&self, owner: Uuid, id: Uuid) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(tx_error)?;
        let address_id: Uuid = sqlx::query_scalar(
            "DELETE FROM desenvolvedores WHERE id_desenvolvedor = $1 AND user_id = $2 \
             RETURNING id_endereco",
        )
        .bind(id)
        .bind(owner)
        .fetch_optional(&mut *tx)
        .await
        .map_err(query_error("developer"))?
        .ok_or(StorageError::NotFound { entity: "developer" })?;
        delete_address(&mut tx, owner, address_id).await?;
        tx.commit().await.map_err(tx_error)?;
        Ok(())
    }

    async fn list_projects(&self, owner: Uuid) -> Result<Vec<Project>, StorageError> {
        sqlx::query_as("SELECT * FROM servicos_projetos WHERE user_id = $1 ORDER BY titulo")
            .bind(owner)
            .fetch_all(&self.pool)
            .await
            .map_err(query_error("project"))
    }

    async fn get_project(&self, owner: Uuid, id: Uuid) -> Result<Project, StorageError> {
        sqlx::query_as("SELECT * FROM servicos_projetos WHERE id_servico = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_error("project"))?
            .ok_or(StorageError::NotFound { entity: "project" })
    }

    async fn create_project(
        &self,
        owner: Uuid,
        links: ProjectLinks,
        fields: ProjectFields,
    ) -> Result<Project, StorageError> {
        let mut tx = self.pool.begin().await.map_err(tx_error)?;
        check_project_links(&mut tx, owner, &links).await?;
        let project = sqlx::query_as(
            "INSERT INTO servicos_projetos (user_id, id_cliente, id_desenvolvedor, titulo, \
             escopo, status_projeto, data_inicio, data_limite, orcamento, notas_internas) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING *",
        )
        .bind(owner)
        .bind(links.client_id)
        .bind(links.developer_id)
        .bind(&fields.title)
        .bind(&fields.scope)
        .bind(&fields.status)
        .bind(fields.starts_at)
        .bind(fields.due_at)
        .bind(fields.budget)
        .bind(&fields.internal_notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(query_error("project"))?;
        tx.commit().await.map_err(tx_error)?;
        Ok(project)
    }

    async fn update_project(
        &self,
        owner: Uuid,
        id: Uuid,
        links: ProjectLinks,
        fields: ProjectFields,
    ) -> Result<Project, StorageError> {
        let mut tx = self.pool.begin().await.map_err(tx_error)?;
        lock_target(&mut tx, "servicos_projetos", "id_servico", "project", owner, id).await?;
        check_project_links(&mut tx, owner, &links).await?;
        let project = sqlx::query_as(
            "UPDATE servicos_projetos SET id_cliente = $3, id_desenvolvedor = $4, titulo = $5, \
             escopo = $6, status_projeto = $7, data_inicio = $8, data_limite = $9, \
             orcamento = $10, notas_internas = $11 \
             WHERE id_servico = $1 AND user_id = $2 RETURNING *",
        )
        .bind(id)
        .bind(owner)
        .bind(links.client_id)
        .bind(links.developer_id)
        .bind(&fields.title)
        .bind(&fields.scope)
        .bind(&fields.status)
        .bind(fields.starts_at)
        .bind(fields.due_at)
        .bind(fields.budget)
        .bind(&fields.internal_notes)
        .fetch_optional(&mut *tx)
        .await
        .map_err(query_error("project"))?
        .ok_or(StorageError::NotFound { entity: "project" })?;
        tx.commit().await.map_err(tx_error)?;
        Ok(project)
    }

    async fn delete_project(&self, owner: Uuid, id: Uuid) -> Result<(), StorageError> {
        let result = sqlx::query("DELETE FROM servicos_projetos WHERE id_servico = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await
            .map_err(query_error("project"))?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound { entity: "project" });
        }
        Ok(())
    }

    async fn list_infra_items(&self, owner: Uuid) -> Result<Vec<InfraItem>, StorageError> {
        sqlx::query_as("SELECT * FROM itens_infraestrutura WHERE user_id = $1 ORDER BY descricao")
            .bind(owner)
            .fetch_all(&self.pool)
            .await
            .map_err(query_error("infrastructure item"))
    }

    async fn get_infra_item(&self, owner: Uuid, id: Uuid) -> Result<InfraItem, StorageError> {
        sqlx::query_as("SELECT * FROM itens_infraestrutura WHERE id_item = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_error("infrastructure item"))?
            .ok_or(StorageError::NotFound {
                entity: "infrastructure item",
            })
    }

    async fn create_infra_item(
        &self,
        owner: Uuid,
        links: InfraItemLinks,
        fields: InfraItemFields,
        secret_ciphertext: Option<String>,
    ) -> Result<InfraItem, StorageError> {
        let mut tx = self.pool.begin().await.map_err(tx_error)?;
        check_item_links(&mut tx, owner, &links).await?;
        let item = sqlx::query_as(
            "INSERT INTO itens_infraestrutura (user_id, id_cliente, id_desenvolvedor, \
             id_servico, tipo_item, descricao, url_acesso, usuario, referencia_senha, \
             is_critico, data_expiracao, notas_acesso) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) RETURNING *",
        )
        .bind(owner)
        .bind(links.client_id)
        .bind(links.developer_id)
        .bind(links.project_id)
        .bind(&fields.kind)
        .bind(&fields.description)
        .bind(&fields.access_url)
        .bind(&fields.username)
        .bind(secret_ciphertext)
        .bind(fields.is_critical)
        .bind(fields.expires_at)
        .bind(&fields.access_notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(query_error("infrastructure item"))?;
        tx.commit().await.map_err(tx_error)?;
        Ok(item)
    }

    async fn update_infra_item(
        &self,
        owner: Uuid,
        id: Uuid,
        links: InfraItemLinks,
        fields: InfraItemFields,
        secret: SecretChange,
    ) -> Result<InfraItem, StorageError> {
        let mut tx = self.pool.begin().await.map_err(tx_error)?;
        lock_target(&mut tx, "itens_infraestrutura", "id_item", "infrastructure item", owner, id)
            .await?;
        check_item_links(&mut tx, owner, &links).await?;

        // $10 selects whether $11 replaces the stored secret.
        let (replace_secret, ciphertext) = match secret {
            SecretChange::Keep => (false, None),
            SecretChange::Clear => (true, None),
            SecretChange::Set(ciphertext) => (true, Some(ciphertext)),
        };
        let item = sqlx::query_as(
            "UPDATE itens_infraestrutura SET id_cliente = $3, id_desenvolvedor = $4, \
             id_servico = $5, tipo_item = $6, descricao = $7, url_acesso = $8, usuario = $9, \
             referencia_senha = CASE WHEN $10 THEN $11 ELSE referencia_senha END, \
             is_critico = $12, data_expiracao = $13, notas_acesso = $14 \
             WHERE id_item = $1 AND user_id = $2 RETURNING *",
        )
        .bind(id)
        .bind(owner)
        .bind(links.client_id)
        .bind(links.developer_id)
        .bind(links.project_id)
        .bind(&fields.kind)
        .bind(&fields.description)
        .bind(&fields.access_url)
        .bind(&fields.username)
        .bind(replace_secret)
        .bind(ciphertext)
        .bind(fields.is_critical)
        .bind(fields.expires_at)
        .bind(&fields.access_notes)
        .fetch_optional(&mut *tx)
        .await
        .map_err(query_error("infrastructure item"))?
        .ok_or(StorageError::NotFound {
            entity: "infrastructure item",
        })?;
        tx.commit().await.map_err(tx_error)?;
        Ok(item)
    }

    async fn delete_infra_item(&self, owner: Uuid, id: Uuid) -> Result<(), StorageError> {
        let result = sqlx::query("DELETE FROM itens_infraestrutura WHERE id_item = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await
            .map_err(query_error("infrastructure item"))?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound {
                entity: "infrastructure item",
            });
        }
        Ok(())
    }
}
