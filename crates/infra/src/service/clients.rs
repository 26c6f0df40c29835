use tracing::{info, instrument, warn};

use fabdesk_auth::{Actor, require_admin};
use fabdesk_clients::{Client, ClientPatch, NewClient};
use fabdesk_core::ClientId;
use fabdesk_events::{Notification, NotificationKind};
use fabdesk_invoicing::ClientBalance;
use fabdesk_quotes::DevisFilter;

use super::{BackOffice, ServiceResult, not_found, now};
use crate::store::StoreTx;

async fn load_client(tx: &mut dyn StoreTx, id: ClientId) -> ServiceResult<Client> {
    tx.client(id).await?.ok_or_else(|| not_found("client"))
}

impl BackOffice {
    #[instrument(skip(self, actor, new), fields(user_id = %actor.user_id), err)]
    pub async fn create_client(&self, actor: &Actor, new: NewClient) -> ServiceResult<Client> {
        require_admin(actor)?;
        let client = Client::create(ClientId::new(), new, now())?;

        let mut tx = self.begin().await?;
        tx.save_client(&client).await?;
        tx.commit().await?;

        info!(client_id = %client.id, "client created");
        self.notify(
            Notification::new(NotificationKind::ClientCreated, "New client", client.name.clone())
                .about("client", client.id)
                .by(actor.user_id),
        );
        Ok(client)
    }

    #[instrument(skip(self, _actor), err)]
    pub async fn get_client(&self, _actor: &Actor, id: ClientId) -> ServiceResult<Client> {
        let mut tx = self.begin().await?;
        load_client(tx.as_mut(), id).await
    }

    /// Newest first.
    #[instrument(skip(self, _actor), err)]
    pub async fn list_clients(&self, _actor: &Actor) -> ServiceResult<Vec<Client>> {
        let mut tx = self.begin().await?;
        Ok(tx.list_clients().await?)
    }

    /// Case-insensitive match over name, phone and email, sorted by name.
    #[instrument(skip(self, _actor), err)]
    pub async fn search_clients(&self, _actor: &Actor, query: &str) -> ServiceResult<Vec<Client>> {
        let mut tx = self.begin().await?;
        let mut clients: Vec<Client> = tx
            .list_clients()
            .await?
            .into_iter()
            .filter(|c| c.matches(query))
            .collect();
        clients.sort_by_key(|c| c.name.to_lowercase());
        Ok(clients)
    }

    #[instrument(skip(self, actor, patch), fields(user_id = %actor.user_id), err)]
    pub async fn update_client(&self, actor: &Actor, id: ClientId, patch: ClientPatch) -> ServiceResult<Client> {
        require_admin(actor)?;
        let mut tx = self.begin().await?;
        let mut client = load_client(tx.as_mut(), id).await?;
        client.update(patch, now())?;
        tx.save_client(&client).await?;
        tx.commit().await?;

        info!(client_id = %id, "client updated");
        self.notify(
            Notification::new(NotificationKind::ClientUpdated, "Client updated", client.name.clone())
                .about("client", id)
                .by(actor.user_id),
        );
        Ok(client)
    }

    /// Refused while the client still owns quotes or invoices.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id), err)]
    pub async fn delete_client(&self, actor: &Actor, id: ClientId) -> ServiceResult<()> {
        require_admin(actor)?;
        let mut tx = self.begin().await?;
        let client = load_client(tx.as_mut(), id).await?;
        let devis_count = tx.count_devis_for_client(id).await?;
        let invoice_count = tx.list_invoices(Some(id)).await?.len();
        client.ensure_deletable(devis_count, invoice_count).inspect_err(|e| {
            warn!(client_id = %id, error = %e, "client deletion rejected");
        })?;
        tx.delete_client(id).await?;
        tx.commit().await?;

        info!(client_id = %id, "client deleted");
        self.notify(
            Notification::new(NotificationKind::ClientDeleted, "Client deleted", client.name)
                .about("client", id)
                .by(actor.user_id),
        );
        Ok(())
    }

    /// Invoices with their payments, totals and quotes not billed yet.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id), err)]
    pub async fn client_balance(&self, actor: &Actor, id: ClientId) -> ServiceResult<ClientBalance> {
        require_admin(actor)?;
        let mut tx = self.begin().await?;
        load_client(tx.as_mut(), id).await?;

        let invoices = tx.list_invoices(Some(id)).await?;
        let mut with_payments = Vec::with_capacity(invoices.len());
        for invoice in invoices {
            let payments = tx.payments_for_invoice(invoice.id).await?;
            with_payments.push((invoice, payments));
        }
        let devis = tx
            .list_devis(&DevisFilter {
                client_id: Some(id),
                ..DevisFilter::default()
            })
            .await?;

        Ok(ClientBalance::compute(id, with_payments, &devis))
    }
}
